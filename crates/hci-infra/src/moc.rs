use async_trait::async_trait;
use compute_api::{ComputeClient, VirtualMachine};
use tracing::debug;

use crate::types::NetworkAttachment;
use crate::{ComputeProvider, Error, NetworkInterfaceResolver, Result};

/// Compute provider backed by the cloud agent's REST API.
///
/// All configuration is loaded from environment variables via `from_env()`.
#[derive(Clone)]
pub struct MocProvider {
    client: ComputeClient,
}

impl MocProvider {
    pub fn new(client: ComputeClient) -> Self {
        Self { client }
    }

    /// Create from env vars:
    ///
    /// - `MOC_API_URL` (required)
    /// - `MOC_API_TOKEN` (required)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url =
            std::env::var("MOC_API_URL").map_err(|_| Error::MissingEnv("MOC_API_URL".into()))?;
        let token = std::env::var("MOC_API_TOKEN")
            .map_err(|_| Error::MissingEnv("MOC_API_TOKEN".into()))?;

        Ok(Self::new(ComputeClient::new(url, token)))
    }

    fn attachment(requested: &str, nic: compute_api::NetworkInterface) -> Result<NetworkAttachment> {
        let name = nic.name.filter(|n| !n.is_empty()).ok_or_else(|| {
            Error::TranslationFailed(format!("network interface {requested} has no name"))
        })?;
        Ok(NetworkAttachment { name, id: nic.id })
    }
}

#[async_trait]
impl ComputeProvider for MocProvider {
    async fn get(&self, group: &str, name: &str) -> compute_api::Result<Option<VirtualMachine>> {
        self.client.get_virtual_machine(group, name).await
    }

    async fn create_or_update(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> compute_api::Result<VirtualMachine> {
        self.client
            .create_or_update_virtual_machine(group, name, vm)
            .await
    }

    async fn delete(&self, group: &str, name: &str) -> compute_api::Result<()> {
        self.client.delete_virtual_machine(group, name).await
    }
}

#[async_trait]
impl NetworkInterfaceResolver for MocProvider {
    async fn get(&self, group: &str, name: &str) -> Result<NetworkAttachment> {
        match self.client.get_network_interface(group, name).await {
            Ok(nic) => Self::attachment(name, nic),
            Err(e) if e.is_not_found() => {
                debug!(nic = name, group, "network interface not found");
                Err(Error::DependencyNotFound {
                    kind: "network interface",
                    name: name.to_string(),
                })
            }
            Err(e) => Err(Error::provider(format!("failed to get network interface {name}"), e)),
        }
    }
}
