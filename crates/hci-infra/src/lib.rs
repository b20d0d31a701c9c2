pub mod credentials;
pub mod hardware;
pub mod image;
pub mod moc;
pub mod naming;
pub mod telemetry;
pub mod types;
pub mod virtual_machines;

use async_trait::async_trait;
use compute_api::VirtualMachine;
use types::NetworkAttachment;

pub use virtual_machines::VirtualMachineService;

/// Login user provisioned on Linux guests.
pub const DEFAULT_USER_NAME: &str = "clouduser";

/// Well-known administrator identity provisioned on Windows guests.
pub const WINDOWS_ADMIN_USER_NAME: &str = "Administrator";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid image spec: {0}")]
    InvalidImageSpec(String),

    #[error("invalid vm spec: {0}")]
    InvalidSpec(String),

    #[error("failed to generate ssh credentials: {0}")]
    CredentialGenerationFailed(String),

    #[error("failed to generate computer name: {0}")]
    NameGenerationFailed(String),

    #[error("{kind} {name} not found")]
    DependencyNotFound { kind: &'static str, name: String },

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: compute_api::Error,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot translate provider payload: {0}")]
    TranslationFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("missing env var: {0}")]
    MissingEnv(String),
}

impl Error {
    pub(crate) fn provider(context: impl Into<String>, source: compute_api::Error) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DependencyNotFound { .. })
    }

    /// Whether the outer control loop should try the attempt again later.
    ///
    /// Malformed input never converges on its own; missing dependencies,
    /// exhausted randomness and remote failures usually do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidImageSpec(_)
            | Self::InvalidSpec(_)
            | Self::TranslationFailed(_)
            | Self::MissingEnv(_)
            | Self::NotFound(_)
            | Self::Cancelled => false,
            Self::CredentialGenerationFailed(_)
            | Self::NameGenerationFailed(_)
            | Self::DependencyNotFound { .. }
            | Self::Provider { .. } => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client-side view of the compute provider's virtual machine API.
///
/// The provider is the source of truth: `create_or_update` must be an
/// idempotent upsert keyed by `(group, name)`.
#[async_trait]
pub trait ComputeProvider: Send + Sync + 'static {
    /// Fetch a VM. `Ok(None)` when the provider has no record of it.
    async fn get(&self, group: &str, name: &str) -> compute_api::Result<Option<VirtualMachine>>;

    /// Create the VM if absent, update it in place otherwise.
    async fn create_or_update(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> compute_api::Result<VirtualMachine>;

    /// Remove a VM. A missing VM is reported as an error for which
    /// `compute_api::Error::is_not_found` holds.
    async fn delete(&self, group: &str, name: &str) -> compute_api::Result<()>;
}

/// Looks up network attachments produced by the network-interface reconciler.
#[async_trait]
pub trait NetworkInterfaceResolver: Send + Sync + 'static {
    /// Resolve a NIC by name; absence is `Error::DependencyNotFound`.
    async fn get(&self, group: &str, name: &str) -> Result<NetworkAttachment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_input_is_not_retried() {
        assert!(!Error::InvalidImageSpec("missing image reference".into()).is_retryable());
        assert!(!Error::InvalidSpec("vm name is empty".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn transient_failures_are_retried() {
        assert!(Error::NameGenerationFailed("os rng".into()).is_retryable());
        assert!(
            Error::DependencyNotFound {
                kind: "network interface",
                name: "nic-1".into(),
            }
            .is_retryable()
        );
        assert!(
            Error::provider(
                "cannot create vm",
                compute_api::Error::NotFound {
                    endpoint: "create or update virtual machine",
                },
            )
            .is_retryable()
        );
    }

    #[test]
    fn provider_error_keeps_context_and_source() {
        let err = Error::provider(
            "failed to delete vm vm1 in resource group rg1",
            compute_api::Error::NotFound {
                endpoint: "delete virtual machine",
            },
        );
        assert_eq!(
            err.to_string(),
            "failed to delete vm vm1 in resource group rg1: compute api delete virtual machine: resource not found"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
