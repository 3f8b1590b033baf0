//! Appliers that copy the mandatory fields of an instance type into a VirtualMachineInstance.
//!
//! Every applier first checks whether the target already sets one of the fields it owns. If so
//! it reports the conflicting paths and leaves the target untouched, otherwise it copies the
//! instance type values over.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec, preference::VirtualMachinePreferenceSpec,
        virtual_machine::VirtualMachineInstanceSpec,
    },
};

mod annotations;
mod cpu;
mod devices;
mod domain;
mod memory;
mod scheduling;

pub use memory::overcommitted_request;

/// Runs every instance type applier against the target and collects all conflicts.
///
/// The preference is only consulted for the CPU topology.
pub fn apply_instancetype(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    preference: Option<&VirtualMachinePreferenceSpec>,
    vmi_spec: &mut VirtualMachineInstanceSpec,
    vmi_metadata: &mut ObjectMeta,
) -> Conflicts {
    let mut conflicts = Conflicts::new();

    conflicts.extend(scheduling::apply_node_selector(base, instancetype, vmi_spec));
    conflicts.extend(scheduling::apply_scheduler_name(base, instancetype, vmi_spec));
    conflicts.extend(cpu::apply_cpu(base, instancetype, preference, vmi_spec));
    conflicts.extend(memory::apply_memory(base, instancetype, vmi_spec));
    conflicts.extend(domain::apply_io_threads_policy(base, instancetype, vmi_spec));
    conflicts.extend(domain::apply_io_threads(base, instancetype, vmi_spec));
    conflicts.extend(domain::apply_launch_security(base, instancetype, vmi_spec));
    conflicts.extend(devices::apply_gpus(base, instancetype, vmi_spec));
    conflicts.extend(devices::apply_host_devices(base, instancetype, vmi_spec));
    conflicts.extend(annotations::apply_annotations(
        &instancetype.annotations,
        vmi_metadata,
    ));

    conflicts
}
