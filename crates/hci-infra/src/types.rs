use std::fmt;

use compute_api::VmType;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Desired state of one virtual machine, as handed to `reconcile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSpec {
    pub name: String,
    pub nic_name: String,
    #[serde(default)]
    pub ssh_key_data: Vec<String>,
    pub size: String,
    #[serde(default)]
    pub gpu_count: i32,
    #[serde(default)]
    pub zone: Option<String>,
    pub image: Image,
    #[serde(default)]
    pub os_disk: OsDisk,
    #[serde(default)]
    pub custom_data: String,
    #[serde(default)]
    pub vm_type: VmType,
    #[serde(default)]
    pub storage_container: String,
    #[serde(default)]
    pub availability_set_name: Option<String>,
    #[serde(default)]
    pub placement_group_name: Option<String>,
}

impl VmSpec {
    /// Reject specs that cannot address anything on the provider.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidSpec("vm name is empty".into()));
        }
        if self.nic_name.trim().is_empty() {
            return Err(Error::InvalidSpec(format!(
                "vm {} does not reference a network interface",
                self.name
            )));
        }
        Ok(())
    }

    pub fn availability_set(&self) -> Option<&str> {
        self.availability_set_name.as_deref().filter(|s| !s.is_empty())
    }

    pub fn placement_group(&self) -> Option<&str> {
        self.placement_group_name.as_deref().filter(|s| !s.is_empty())
    }
}

/// Declarative image descriptor. Exactly one addressing mode must resolve:
/// explicit `id`, shared-gallery coordinates, or a marketplace triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub gallery: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub offer: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub os_type: OsType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default)]
    pub os_type: OsType,
}

/// Guest operating system family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsType {
    Linux,
    Windows,
    Windows2022,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OsType {
    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows | Self::Windows2022)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Windows2022 => "Windows2022",
            Self::Unknown => "Unknown",
        }
    }

    /// Wire OS type; unknown families are left for the provider to infer.
    pub fn to_operating_system_type(self) -> Option<compute_api::OperatingSystemType> {
        match self {
            Self::Linux => Some(compute_api::OperatingSystemType::Linux),
            Self::Windows | Self::Windows2022 => Some(compute_api::OperatingSystemType::Windows),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved network interface the VM will be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub name: String,
    pub id: Option<String>,
}

/// Identity of the owning resource and the resource group all calls target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub resource_group: String,
    pub owner_kind: String,
    pub owner_name: String,
}

impl Scope {
    pub fn new(
        resource_group: impl Into<String>,
        owner_kind: impl Into<String>,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: resource_group.into(),
            owner_kind: owner_kind.into(),
            owner_name: owner_name.into(),
        }
    }

    /// Create from env vars:
    ///
    /// - `MOC_RESOURCE_GROUP` (required)
    /// - `MOC_OWNER_KIND` (default: `"AzureStackHCIMachine"`)
    /// - `MOC_OWNER_NAME` (default: `default_owner`)
    pub fn from_env(default_owner: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let resource_group = std::env::var("MOC_RESOURCE_GROUP")
            .map_err(|_| Error::MissingEnv("MOC_RESOURCE_GROUP".into()))?;
        let owner_kind =
            std::env::var("MOC_OWNER_KIND").unwrap_or_else(|_| "AzureStackHCIMachine".into());
        let owner_name = std::env::var("MOC_OWNER_NAME").unwrap_or_else(|_| default_owner.into());

        Ok(Self {
            resource_group,
            owner_kind,
            owner_name,
        })
    }

    /// `<kind>/<name>` of the custom resource driving this reconcile.
    pub fn owner(&self) -> String {
        format!("{}/{}", self.owner_kind, self.owner_name)
    }

    /// `<group>/<name>` of a provider-side resource.
    pub fn resource_name(&self, name: &str) -> String {
        format!("{}/{}", self.resource_group, name)
    }
}

/// Provider-reported VM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VmState {
    Creating,
    Updating,
    Running,
    Deleting,
    Failed,
    Unknown,
}

impl VmState {
    pub fn from_provisioning_state(state: Option<&str>) -> Self {
        match state {
            Some("Succeeded") => Self::Running,
            Some("Creating") => Self::Creating,
            Some("Updating") => Self::Updating,
            Some("Deleting") => Self::Deleting,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Observed VM, translated from the provider representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmInfo {
    pub id: Option<String>,
    pub name: String,
    pub computer_name: Option<String>,
    pub size: Option<String>,
    pub os_type: Option<String>,
    pub gpu_count: usize,
    pub nic_ids: Vec<String>,
    pub image: Option<compute_api::ImageReference>,
    pub availability_set: Option<String>,
    pub placement_group: Option<String>,
    pub state: VmState,
}

impl TryFrom<compute_api::VirtualMachine> for VmInfo {
    type Error = Error;

    fn try_from(vm: compute_api::VirtualMachine) -> Result<Self> {
        let name = vm
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::TranslationFailed("virtual machine has no name".into()))?;
        let props = vm.properties.ok_or_else(|| {
            Error::TranslationFailed(format!("virtual machine {name} has no properties"))
        })?;

        let (size, gpu_count) = match props.hardware_profile {
            Some(hw) => (
                Some(hw.vm_size),
                hw.virtual_machine_gpus.map_or(0, |gpus| gpus.len()),
            ),
            None => (None, 0),
        };

        let (computer_name, os_type) = match props.os_profile {
            Some(os) => (
                os.computer_name,
                os.os_type.map(|t| format!("{t:?}")),
            ),
            None => (None, None),
        };

        let nic_ids = props
            .network_profile
            .map(|net| net.network_interfaces.into_iter().map(|nic| nic.id).collect())
            .unwrap_or_default();

        Ok(Self {
            id: vm.id,
            name,
            computer_name,
            size,
            os_type,
            gpu_count,
            nic_ids,
            image: props.storage_profile.and_then(|s| s.image_reference),
            availability_set: props.availability_set_profile.map(|a| a.name),
            placement_group: props.placement_group_profile.map(|p| p.name),
            state: VmState::from_provisioning_state(props.provisioning_state.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_deserializes_from_camel_case() {
        let spec: VmSpec = serde_json::from_value(json!({
            "name": "capi-md-0",
            "nicName": "capi-md-0-nic",
            "size": "Standard_A4_v2",
            "gpuCount": 2,
            "image": {
                "name": "linux-cblmariner",
                "version": "1.0.0",
                "osType": "Linux"
            },
            "osDisk": { "osType": "Linux" },
            "vmType": "Tenant",
            "availabilitySetName": "capi-as"
        }))
        .unwrap();

        assert_eq!(spec.gpu_count, 2);
        assert_eq!(spec.image.os_type, OsType::Linux);
        assert!(spec.ssh_key_data.is_empty());
        assert_eq!(spec.availability_set(), Some("capi-as"));
        assert_eq!(spec.placement_group(), None);
    }

    #[test]
    fn unrecognised_os_type_is_unknown() {
        let image: Image = serde_json::from_value(json!({ "name": "x", "osType": "Plan9" })).unwrap();
        assert_eq!(image.os_type, OsType::Unknown);
    }

    #[test]
    fn empty_names_are_invalid() {
        let spec = VmSpec {
            nic_name: "nic".into(),
            ..Default::default()
        };
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));

        let spec = VmSpec {
            name: "vm".into(),
            ..Default::default()
        };
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn empty_optional_names_are_absent() {
        let spec = VmSpec {
            availability_set_name: Some(String::new()),
            placement_group_name: Some("pg".into()),
            ..Default::default()
        };
        assert_eq!(spec.availability_set(), None);
        assert_eq!(spec.placement_group(), Some("pg"));
    }

    #[test]
    fn translation_requires_name_and_properties() {
        let err = VmInfo::try_from(compute_api::VirtualMachine::default()).unwrap_err();
        assert!(matches!(err, Error::TranslationFailed(_)));

        let err = VmInfo::try_from(compute_api::VirtualMachine {
            name: Some("vm1".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::TranslationFailed(_)));
    }

    #[test]
    fn translation_maps_provider_fields() {
        let vm: compute_api::VirtualMachine = serde_json::from_value(json!({
            "id": "/resourceGroups/rg1/virtualMachines/vm1",
            "name": "vm1",
            "properties": {
                "provisioningState": "Succeeded",
                "hardwareProfile": {
                    "vmSize": "Standard_NK6",
                    "virtualMachineGPUs": [{ "assignment": "GpuDefault" }]
                },
                "osProfile": { "computerName": "moc-labc123xyz0", "osType": "Linux" },
                "networkProfile": { "networkInterfaces": [{ "id": "vm1-nic" }] },
                "placementGroupProfile": { "name": "pg1", "groupName": "rg1" }
            }
        }))
        .unwrap();

        let info = VmInfo::try_from(vm).unwrap();
        assert_eq!(info.name, "vm1");
        assert_eq!(info.state, VmState::Running);
        assert_eq!(info.size.as_deref(), Some("Standard_NK6"));
        assert_eq!(info.gpu_count, 1);
        assert_eq!(info.os_type.as_deref(), Some("Linux"));
        assert_eq!(info.nic_ids, vec!["vm1-nic".to_string()]);
        assert_eq!(info.placement_group.as_deref(), Some("pg1"));
        assert_eq!(info.availability_set, None);
    }

    #[test]
    fn scope_formats_owner_and_resource_names() {
        let scope = Scope::new("rg1", "AzureStackHCIMachine", "capi-md-0");
        assert_eq!(scope.owner(), "AzureStackHCIMachine/capi-md-0");
        assert_eq!(scope.resource_name("vm1"), "rg1/vm1");
    }
}
