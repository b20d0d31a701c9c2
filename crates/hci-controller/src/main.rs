mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hci_infra::VirtualMachineService;
use hci_infra::moc::MocProvider;
use hci_infra::types::{Scope, VmSpec};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling reconcile attempt");
            on_signal.cancel();
        }
    });

    match run(args.command, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let retryable = e
                .downcast_ref::<hci_infra::Error>()
                .is_some_and(hci_infra::Error::is_retryable);
            tracing::error!(error = %e, retryable, "attempt failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cancel: &CancellationToken) -> Result<(), BoxError> {
    let provider = Arc::new(MocProvider::from_env()?);

    match command {
        Command::Reconcile { spec } => {
            let raw = std::fs::read_to_string(&spec)
                .map_err(|e| format!("read {}: {e}", spec.display()))?;
            let spec: VmSpec = serde_json::from_str(&raw)
                .map_err(|e| format!("parse {}: {e}", spec.display()))?;

            let service = service(&spec.name, provider)?;
            service.reconcile(cancel, &spec).await?;
        }
        Command::Delete { name } => {
            service(&name, provider)?.delete(cancel, &name).await?;
        }
        Command::Get { name } => {
            let info = service(&name, provider)?.get(cancel, &name).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

fn service(vm_name: &str, provider: Arc<MocProvider>) -> hci_infra::Result<VirtualMachineService> {
    let scope = Scope::from_env(vm_name)?;
    tracing::info!(group = %scope.resource_group, owner = %scope.owner(), "using resource scope");
    Ok(VirtualMachineService::new(scope, provider.clone(), provider))
}
