use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run a single virtual machine convergence attempt against the cloud agent.
///
/// Connection and scope come from the environment (`MOC_API_URL`,
/// `MOC_API_TOKEN`, `MOC_RESOURCE_GROUP`); retries are left to the caller.
#[derive(Debug, Parser)]
#[command(name = "hci-controller", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update a VM from a JSON spec file.
    Reconcile {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Delete a VM; succeeds if it is already gone.
    Delete {
        #[arg(long)]
        name: String,
    },
    /// Print the provider's view of a VM as JSON.
    Get {
        #[arg(long)]
        name: String,
    },
}
