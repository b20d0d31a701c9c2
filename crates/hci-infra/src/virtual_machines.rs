use std::future::Future;
use std::sync::Arc;

use compute_api::{
    AvailabilitySetReference, LinuxConfiguration, NetworkInterfaceReference, NetworkProfile,
    OsProfile, PlacementGroupReference, SshConfiguration, SshPublicKey, StorageProfile,
    VirtualHardDisk, VirtualMachine, VirtualMachineProperties, WindowsConfiguration,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::credentials;
use crate::hardware::hardware_profile;
use crate::image::resolve_image_reference;
use crate::naming::generate_computer_name;
use crate::telemetry::{self, Operation, ResourceType};
use crate::types::{NetworkAttachment, Scope, VmInfo, VmSpec};
use crate::{
    ComputeProvider, DEFAULT_USER_NAME, Error, NetworkInterfaceResolver, Result,
    WINDOWS_ADMIN_USER_NAME,
};

/// Name of the OS disk backing `vm_name`.
pub fn os_disk_name(vm_name: &str) -> String {
    format!("{vm_name}_OSDisk")
}

/// Converges virtual machines in one resource group towards their spec.
///
/// Holds no state between calls; every attempt rebuilds the full instance
/// definition and leaves idempotence to the provider's upsert.
#[derive(Clone)]
pub struct VirtualMachineService {
    scope: Scope,
    compute: Arc<dyn ComputeProvider>,
    nics: Arc<dyn NetworkInterfaceResolver>,
}

impl VirtualMachineService {
    pub fn new(
        scope: Scope,
        compute: Arc<dyn ComputeProvider>,
        nics: Arc<dyn NetworkInterfaceResolver>,
    ) -> Self {
        Self {
            scope,
            compute,
            nics,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Fetch a virtual machine and translate it into a `VmInfo`.
    pub async fn get(&self, cancel: &CancellationToken, name: &str) -> Result<VmInfo> {
        let group = &self.scope.resource_group;

        let vm = cancellable(cancel, self.compute.get(group, name))
            .await?
            .map_err(|e| Error::provider(format!("failed to get vm {name}"), e))?
            .ok_or_else(|| Error::NotFound(format!("vm {name}")))?;

        VmInfo::try_from(vm)
    }

    /// Create or update the virtual machine described by `spec`.
    pub async fn reconcile(&self, cancel: &CancellationToken, spec: &VmSpec) -> Result<()> {
        spec.validate()?;
        let group = &self.scope.resource_group;

        info!(nic = %spec.nic_name, "getting nic");
        let nic = cancellable(cancel, self.nics.get(group, &spec.nic_name)).await??;
        info!(nic = %spec.nic_name, "got nic");

        let storage_profile = storage_profile(spec)?;

        info!(
            name = %spec.name,
            nic = %spec.nic_name,
            size = %spec.size,
            gpu_count = spec.gpu_count,
            image = ?spec.image,
            os_disk = ?spec.os_disk,
            vm_type = ?spec.vm_type,
            availability_set = ?spec.availability_set(),
            placement_group = ?spec.placement_group(),
            "creating vm"
        );

        let public_keys = bootstrap_credentials(cancel, &spec.ssh_key_data).await?;
        info!(keys = public_keys.len(), "ssh credentials ready");
        let computer_name = generate_computer_name(spec.image.os_type)?;

        let vm = self.instance_definition(spec, &nic, storage_profile, public_keys, computer_name);

        let res = cancellable(cancel, self.compute.create_or_update(group, &spec.name, &vm)).await?;
        telemetry::write_operation_log(
            &self.scope,
            Operation::CreateOrUpdate,
            ResourceType::VirtualMachine,
            &spec.name,
            res.as_ref().err(),
        );
        res.map_err(|e| {
            Error::provider(
                format!("cannot create vm {} in resource group {group}", spec.name),
                e,
            )
        })?;

        info!(name = %spec.name, "successfully created vm");
        Ok(())
    }

    /// Delete a virtual machine. A VM the provider no longer knows is
    /// already converged and counts as success.
    pub async fn delete(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        let group = &self.scope.resource_group;
        info!(vm = name, "deleting vm");

        let res = cancellable(cancel, self.compute.delete(group, name)).await?;
        telemetry::write_operation_log(
            &self.scope,
            Operation::Delete,
            ResourceType::VirtualMachine,
            name,
            res.as_ref().err().filter(|e| !e.is_not_found()),
        );

        match res {
            Ok(()) => {
                info!(vm = name, "successfully deleted vm");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(vm = name, "vm already deleted");
                Ok(())
            }
            Err(e) => Err(Error::provider(
                format!("failed to delete vm {name} in resource group {group}"),
                e,
            )),
        }
    }

    fn instance_definition(
        &self,
        spec: &VmSpec,
        nic: &NetworkAttachment,
        storage_profile: StorageProfile,
        public_keys: Vec<SshPublicKey>,
        computer_name: String,
    ) -> VirtualMachine {
        let ssh = SshConfiguration { public_keys };

        let os_profile = if spec.image.os_type.is_windows() {
            OsProfile {
                computer_name: Some(computer_name),
                admin_username: Some(WINDOWS_ADMIN_USER_NAME.to_string()),
                admin_password: Some(String::new()),
                custom_data: Some(spec.custom_data.clone()),
                os_type: spec.os_disk.os_type.to_operating_system_type(),
                linux_configuration: None,
                windows_configuration: Some(WindowsConfiguration { ssh }),
            }
        } else {
            OsProfile {
                computer_name: Some(computer_name),
                admin_username: Some(DEFAULT_USER_NAME.to_string()),
                admin_password: None,
                custom_data: Some(spec.custom_data.clone()),
                os_type: spec.os_disk.os_type.to_operating_system_type(),
                linux_configuration: Some(LinuxConfiguration {
                    ssh,
                    disable_password_authentication: true,
                }),
                windows_configuration: None,
            }
        };

        let group = &self.scope.resource_group;
        VirtualMachine {
            id: None,
            name: Some(spec.name.clone()),
            properties: Some(VirtualMachineProperties {
                storage_profile: Some(storage_profile),
                os_profile: Some(os_profile),
                network_profile: Some(NetworkProfile {
                    network_interfaces: vec![NetworkInterfaceReference {
                        id: nic.name.clone(),
                    }],
                }),
                hardware_profile: Some(hardware_profile(&spec.size, spec.gpu_count)),
                vm_type: Some(spec.vm_type),
                availability_set_profile: spec.availability_set().map(|name| {
                    AvailabilitySetReference {
                        name: name.to_string(),
                        group_name: group.clone(),
                    }
                }),
                placement_group_profile: spec.placement_group().map(|name| {
                    PlacementGroupReference {
                        name: name.to_string(),
                        group_name: group.clone(),
                    }
                }),
                provisioning_state: None,
            }),
        }
    }
}

fn storage_profile(spec: &VmSpec) -> Result<StorageProfile> {
    let image_reference = resolve_image_reference(&spec.image)?;

    Ok(StorageProfile {
        os_disk: Some(compute_api::OsDisk {
            vhd: Some(VirtualHardDisk {
                uri: os_disk_name(&spec.name),
            }),
        }),
        data_disks: Vec::new(),
        image_reference: Some(image_reference),
        vm_config_container_name: Some(spec.storage_container.clone()),
    })
}

/// Key generation is CPU bound, so it runs off the async workers.
async fn bootstrap_credentials(
    cancel: &CancellationToken,
    supplied: &[String],
) -> Result<Vec<SshPublicKey>> {
    if !supplied.is_empty() {
        return credentials::ssh_public_keys(supplied);
    }

    info!("no ssh keys supplied, generating a key pair");
    let task = tokio::task::spawn_blocking(|| credentials::ssh_public_keys(&[]));
    cancellable(cancel, task)
        .await?
        .map_err(|e| Error::CredentialGenerationFailed(format!("key generation task: {e}")))?
}

/// Race `fut` against `cancel`, preferring cancellation when both are ready.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}
