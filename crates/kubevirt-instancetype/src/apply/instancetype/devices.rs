use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{instancetype::VirtualMachineInstancetypeSpec, virtual_machine::VirtualMachineInstanceSpec},
};

pub(super) fn apply_gpus(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.gpus.is_empty() {
        return Conflicts::new();
    }

    let devices = &mut vmi_spec.domain.devices;
    if !devices.gpus.is_empty() {
        return base.child(["domain", "devices", "gpus"]).into();
    }

    devices.gpus.clone_from(&instancetype.gpus);
    Conflicts::new()
}

pub(super) fn apply_host_devices(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.host_devices.is_empty() {
        return Conflicts::new();
    }

    let devices = &mut vmi_spec.domain.devices;
    if !devices.host_devices.is_empty() {
        return base.child(["domain", "devices", "hostDevices"]).into();
    }

    devices.host_devices.clone_from(&instancetype.host_devices);
    Conflicts::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::virtual_machine::{Gpu, HostDevice};

    fn instancetype() -> VirtualMachineInstancetypeSpec {
        VirtualMachineInstancetypeSpec {
            gpus: vec![Gpu {
                name: "gpu1".to_owned(),
                device_name: "nvidia.com/A400".to_owned(),
                ..Default::default()
            }],
            host_devices: vec![HostDevice {
                name: "hostdev1".to_owned(),
                device_name: "intel.com/qat".to_owned(),
                tag: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn copies_devices_into_empty_lists() {
        let base = FieldPath::new(["spec"]);
        let mut vmi_spec = VirtualMachineInstanceSpec::default();

        assert!(apply_gpus(&base, &instancetype(), &mut vmi_spec).is_empty());
        assert!(apply_host_devices(&base, &instancetype(), &mut vmi_spec).is_empty());
        assert_eq!(vmi_spec.domain.devices.gpus, instancetype().gpus);
        assert_eq!(vmi_spec.domain.devices.host_devices, instancetype().host_devices);
    }

    #[test]
    fn existing_devices_conflict() {
        let base = FieldPath::new(["spec"]);
        let mut vmi_spec = VirtualMachineInstanceSpec::default();
        vmi_spec.domain.devices.gpus = vec![Gpu::default()];
        vmi_spec.domain.devices.host_devices = vec![HostDevice::default()];

        assert_eq!(
            apply_gpus(&base, &instancetype(), &mut vmi_spec).to_string(),
            "spec.domain.devices.gpus"
        );
        assert_eq!(
            apply_host_devices(&base, &instancetype(), &mut vmi_spec).to_string(),
            "spec.domain.devices.hostDevices"
        );
        assert_eq!(vmi_spec.domain.devices.gpus, vec![Gpu::default()]);
    }

    #[test]
    fn empty_instancetype_lists_are_ignored() {
        let mut vmi_spec = VirtualMachineInstanceSpec::default();
        vmi_spec.domain.devices.gpus = vec![Gpu::default()];

        let conflicts = apply_gpus(
            &FieldPath::new(["spec"]),
            &VirtualMachineInstancetypeSpec::default(),
            &mut vmi_spec,
        );
        assert!(conflicts.is_empty());
    }
}
