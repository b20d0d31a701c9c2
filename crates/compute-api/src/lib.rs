//! Typed Rust client for the on-prem compute-management API.
//!
//! Covers the subset the VM reconciler needs:
//! virtual machines (get, create-or-update, delete) and network interfaces (get).

mod types;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("compute api {endpoint}: resource not found")]
    NotFound { endpoint: &'static str },
}

impl Error {
    /// True when the API reported the addressed resource as absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api { status, .. } => *status == reqwest::StatusCode::NOT_FOUND,
            Self::Request(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the compute-management REST API.
#[derive(Clone)]
pub struct ComputeClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl ComputeClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, group: &str, path: &str) -> String {
        format!("{}/resourceGroups/{group}{path}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { endpoint });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    // ── Virtual machines ─────────────────────────────────────────────

    /// Fetch a virtual machine. A 404 is reported as `Ok(None)`.
    pub async fn get_virtual_machine(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Option<VirtualMachine>> {
        let resp = self
            .http
            .get(self.url(group, &format!("/virtualMachines/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        match Self::check(resp, "get virtual machine").await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create the virtual machine if absent, update it in place otherwise.
    pub async fn create_or_update_virtual_machine(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine> {
        let resp = self
            .http
            .put(self.url(group, &format!("/virtualMachines/{name}")))
            .header("Authorization", self.auth())
            .json(vm)
            .send()
            .await?;

        Self::check(resp, "create or update virtual machine")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(group, &format!("/virtualMachines/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "delete virtual machine").await?;
        Ok(())
    }

    // ── Network interfaces ───────────────────────────────────────────

    pub async fn get_network_interface(&self, group: &str, name: &str) -> Result<NetworkInterface> {
        let resp = self
            .http
            .get(self.url(group, &format!("/networkInterfaces/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get network interface")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }
}
