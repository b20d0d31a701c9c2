use compute_api::{GpuAssignment, HardwareProfile, VirtualMachineGpu};

/// Hardware profile for `size` with `gpu_count` default-assigned GPUs.
///
/// Non-positive counts yield no GPU list. No upper bound is enforced here;
/// the provider rejects what it cannot place.
pub fn hardware_profile(size: &str, gpu_count: i32) -> HardwareProfile {
    HardwareProfile {
        vm_size: size.to_string(),
        virtual_machine_gpus: gpu_list(gpu_count),
    }
}

fn gpu_list(gpu_count: i32) -> Option<Vec<VirtualMachineGpu>> {
    let count = usize::try_from(gpu_count).ok().filter(|&n| n > 0)?;
    Some(vec![
        VirtualMachineGpu {
            assignment: GpuAssignment::GpuDefault,
        };
        count
    ])
}
