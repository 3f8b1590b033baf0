use tracing::debug;

use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec,
        preference::VirtualMachinePreferenceSpec,
        virtual_machine::{Cpu, RESOURCE_CPU, VirtualMachineInstanceSpec},
    },
    merge::Merge,
    topology::CpuTopology,
};

/// Collects every CPU field of the target that the instance type would overwrite.
fn validate_cpu(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &VirtualMachineInstanceSpec,
) -> Conflicts {
    let mut conflicts = Conflicts::new();
    let domain = base.child(["domain"]);
    let resources = &vmi_spec.domain.resources;

    if resources.requests.contains_key(RESOURCE_CPU) {
        conflicts.push(domain.child(["resources", "requests", RESOURCE_CPU]));
    }
    if resources.limits.contains_key(RESOURCE_CPU) {
        conflicts.push(domain.child(["resources", "limits", RESOURCE_CPU]));
    }

    let Some(cpu) = &vmi_spec.domain.cpu else {
        return conflicts;
    };
    let source = &instancetype.cpu;
    let cpu_path = domain.child(["cpu"]);

    if cpu.sockets != 0 {
        conflicts.push(cpu_path.child(["sockets"]));
    }
    if cpu.cores != 0 {
        conflicts.push(cpu_path.child(["cores"]));
    }
    if cpu.threads != 0 {
        conflicts.push(cpu_path.child(["threads"]));
    }
    if cpu.model.is_some() && source.model.is_some() {
        conflicts.push(cpu_path.child(["model"]));
    }
    if cpu.dedicated_cpu_placement && source.dedicated_cpu_placement.is_some() {
        conflicts.push(cpu_path.child(["dedicatedCPUPlacement"]));
    }
    if cpu.isolate_emulator_thread && source.isolate_emulator_thread.is_some() {
        conflicts.push(cpu_path.child(["isolateEmulatorThread"]));
    }
    if cpu.numa.is_some() && source.numa.is_some() {
        conflicts.push(cpu_path.child(["numa"]));
    }
    if cpu.realtime.is_some() && source.realtime.is_some() {
        conflicts.push(cpu_path.child(["realtime"]));
    }
    if cpu.max_sockets != 0 && source.max_sockets.is_some() {
        conflicts.push(cpu_path.child(["maxSockets"]));
    }

    conflicts
}

/// Copies the guest CPU of the instance type, laid out in the topology the preference asks for.
///
/// An instance type without guest vCPUs leaves the target alone.
pub(super) fn apply_cpu(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    preference: Option<&VirtualMachinePreferenceSpec>,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.cpu.guest == 0 {
        return Conflicts::new();
    }

    let conflicts = validate_cpu(base, instancetype, vmi_spec);
    if !conflicts.is_empty() {
        return conflicts;
    }

    let source = &instancetype.cpu;
    let cpu = vmi_spec.domain.cpu.get_or_insert_with(Cpu::default);

    let topology = CpuTopology::for_preference(source.guest, preference);
    debug!(
        vcpus = source.guest,
        sockets = topology.sockets,
        cores = topology.cores,
        threads = topology.threads,
        "resolved guest CPU topology"
    );
    cpu.sockets = topology.sockets;
    cpu.cores = topology.cores;
    cpu.threads = topology.threads;

    cpu.model.merge(&source.model);
    cpu.numa.merge(&source.numa);
    cpu.realtime.merge(&source.realtime);
    if let Some(dedicated_cpu_placement) = source.dedicated_cpu_placement {
        cpu.dedicated_cpu_placement = dedicated_cpu_placement;
    }
    if let Some(isolate_emulator_thread) = source.isolate_emulator_thread {
        cpu.isolate_emulator_thread = isolate_emulator_thread;
    }
    if let Some(max_sockets) = source.max_sockets {
        cpu.max_sockets = max_sockets;
    }

    conflicts
}
