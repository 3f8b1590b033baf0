use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{instancetype::VirtualMachineInstancetypeSpec, virtual_machine::VirtualMachineInstanceSpec},
};

/// Any node selector on the target conflicts, even one identical to the instance type's.
pub(super) fn apply_node_selector(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(node_selector) = &instancetype.node_selector else {
        return Conflicts::new();
    };

    if vmi_spec.node_selector.is_some() {
        return base.child(["nodeSelector"]).into();
    }

    vmi_spec.node_selector = Some(node_selector.clone());
    Conflicts::new()
}

pub(super) fn apply_scheduler_name(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    let Some(scheduler_name) = &instancetype.scheduler_name else {
        return Conflicts::new();
    };

    match &vmi_spec.scheduler_name {
        Some(existing) if existing != scheduler_name => base.child(["schedulerName"]).into(),
        Some(_) => Conflicts::new(),
        None => {
            vmi_spec.scheduler_name = Some(scheduler_name.clone());
            Conflicts::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;

    fn instancetype() -> VirtualMachineInstancetypeSpec {
        VirtualMachineInstancetypeSpec {
            node_selector: Some(BTreeMap::from([(
                "kubernetes.io/arch".to_owned(),
                "amd64".to_owned(),
            )])),
            scheduler_name: Some("volcano".to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn node_selector_is_copied() {
        let mut vmi_spec = VirtualMachineInstanceSpec::default();
        let conflicts = apply_node_selector(&FieldPath::new(["spec"]), &instancetype(), &mut vmi_spec);

        assert!(conflicts.is_empty());
        assert_eq!(vmi_spec.node_selector, instancetype().node_selector);
    }

    #[test]
    fn identical_node_selector_still_conflicts() {
        let mut vmi_spec = VirtualMachineInstanceSpec {
            node_selector: instancetype().node_selector,
            ..Default::default()
        };
        let conflicts = apply_node_selector(&FieldPath::new(["spec"]), &instancetype(), &mut vmi_spec);

        assert_eq!(conflicts.to_string(), "spec.nodeSelector");
    }

    #[rstest]
    #[case(None, "", Some("volcano"))]
    #[case(Some("volcano"), "", Some("volcano"))]
    #[case(Some("default-scheduler"), "spec.schedulerName", Some("default-scheduler"))]
    fn scheduler_name(
        #[case] target: Option<&str>,
        #[case] expected_conflicts: &str,
        #[case] expected_name: Option<&str>,
    ) {
        let mut vmi_spec = VirtualMachineInstanceSpec {
            scheduler_name: target.map(ToOwned::to_owned),
            ..Default::default()
        };
        let conflicts =
            apply_scheduler_name(&FieldPath::new(["spec"]), &instancetype(), &mut vmi_spec);

        assert_eq!(conflicts.to_string(), expected_conflicts);
        assert_eq!(vmi_spec.scheduler_name.as_deref(), expected_name);
    }
}
