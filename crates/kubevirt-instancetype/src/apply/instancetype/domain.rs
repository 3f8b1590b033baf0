//! Appliers for domain level settings that aren't tied to CPU or memory.

use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec,
        virtual_machine::{DiskIoThreads, VirtualMachineInstanceSpec},
    },
};

pub(super) fn apply_io_threads_policy(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(policy) = instancetype.io_threads_policy else {
        return Conflicts::new();
    };

    match vmi_spec.domain.io_threads_policy {
        Some(existing) if existing != policy => base.child(["domain", "ioThreadsPolicy"]).into(),
        _ => {
            vmi_spec.domain.io_threads_policy = Some(policy);
            Conflicts::new()
        }
    }
}

/// Only the supplemental pool thread count is owned by the instance type.
pub(super) fn apply_io_threads(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(count) = instancetype
        .io_threads
        .as_ref()
        .and_then(|io_threads| io_threads.supplemental_pool_thread_count)
    else {
        return Conflicts::new();
    };

    let io_threads = vmi_spec
        .domain
        .io_threads
        .get_or_insert_with(DiskIoThreads::default);
    if io_threads.supplemental_pool_thread_count.is_some() {
        return base
            .child(["domain", "ioThreads", "supplementalPoolThreadCount"])
            .into();
    }

    io_threads.supplemental_pool_thread_count = Some(count);
    Conflicts::new()
}

pub(super) fn apply_launch_security(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(launch_security) = &instancetype.launch_security else {
        return Conflicts::new();
    };

    match &vmi_spec.domain.launch_security {
        Some(existing) if existing != launch_security => {
            base.child(["domain", "launchSecurity"]).into()
        }
        Some(_) => Conflicts::new(),
        None => {
            vmi_spec.domain.launch_security = Some(launch_security.clone());
            Conflicts::new()
        }
    }
}
