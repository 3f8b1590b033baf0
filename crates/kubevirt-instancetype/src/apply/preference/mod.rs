//! Appliers that fill unset fields of a VirtualMachineInstance from a preference.
//!
//! Preferences never produce conflicts. Each category is applied by its own function over the
//! matching part of the target, and only touches values the target left unset.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::{
    crd::{
        preference::{CpuPreferences, VirtualMachinePreferenceSpec},
        virtual_machine::{Cpu, DomainSpec, VirtualMachineInstanceSpec},
    },
    merge::Merge,
};

mod clock;
mod devices;
mod features;
mod firmware;

pub fn apply_preference(
    preference: &VirtualMachinePreferenceSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
    vmi_metadata: &mut ObjectMeta,
) {
    if let Some(cpu) = &preference.cpu {
        apply_cpu_features(cpu, &mut vmi_spec.domain);
    }
    if let Some(devices) = &preference.devices {
        devices::apply_devices(devices, &mut vmi_spec.domain.devices, &vmi_spec.networks);
    }
    if let Some(features) = &preference.features {
        features::apply_features(features, &mut vmi_spec.domain.features);
    }
    if let Some(firmware) = &preference.firmware {
        firmware::apply_firmware(firmware, &mut vmi_spec.domain.firmware);
    }
    if let Some(machine) = &preference.machine {
        clock::apply_machine(machine, &mut vmi_spec.domain.machine);
    }
    if let Some(clock) = &preference.clock {
        clock::apply_clock(clock, &mut vmi_spec.domain.clock);
    }

    vmi_spec.subdomain.merge(&preference.preferred_subdomain);
    vmi_spec
        .termination_grace_period_seconds
        .merge(&preference.preferred_termination_grace_period_seconds);
    vmi_spec
        .architecture
        .merge(&preference.preferred_architecture);

    if !preference.annotations.is_empty() {
        let annotations = vmi_metadata.annotations.get_or_insert_with(Default::default);
        Merge::merge(annotations, &preference.annotations);
    }
}

/// Appends preferred CPU features whose name the target doesn't list yet.
///
/// The CPU block is only created when there is at least one feature to add.
fn apply_cpu_features(preferences: &CpuPreferences, domain: &mut DomainSpec) {
    let existing: BTreeSet<&str> = domain
        .cpu
        .iter()
        .flat_map(|cpu| &cpu.features)
        .map(|feature| feature.name.as_str())
        .collect();
    let missing: Vec<_> = preferences
        .preferred_cpu_features
        .iter()
        .filter(|feature| !existing.contains(feature.name.as_str()))
        .cloned()
        .collect();

    if !missing.is_empty() {
        domain
            .cpu
            .get_or_insert_with(Cpu::default)
            .features
            .extend(missing);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;

    use super::*;
    use crate::crd::virtual_machine::CpuFeature;

    fn feature(name: &str, policy: &str) -> CpuFeature {
        CpuFeature {
            name: name.to_owned(),
            policy: Some(policy.to_owned()),
        }
    }

    #[test]
    fn cpu_features_merge_by_name() {
        let preferences = CpuPreferences {
            preferred_cpu_features: vec![feature("vmx", "require"), feature("pcid", "optional")],
            ..Default::default()
        };
        let mut domain = DomainSpec {
            cpu: Some(Cpu {
                features: vec![feature("vmx", "forbid")],
                ..Default::default()
            }),
            ..Default::default()
        };

        apply_cpu_features(&preferences, &mut domain);

        assert_eq!(
            domain.cpu.unwrap().features,
            vec![feature("vmx", "forbid"), feature("pcid", "optional")]
        );
    }

    #[test]
    fn cpu_block_only_created_for_new_features() {
        let mut domain = DomainSpec::default();
        apply_cpu_features(&CpuPreferences::default(), &mut domain);
        assert_eq!(domain.cpu, None);
    }

    #[test]
    fn fills_scalar_fields_and_annotations() {
        let preference: VirtualMachinePreferenceSpec = serde_yaml::from_str(indoc! {"
            preferredSubdomain: cluster
            preferredTerminationGracePeriodSeconds: 180
            preferredArchitecture: arm64
            annotations:
              from-preference: 'true'
              shared: preference
        "})
        .unwrap();
        let mut vmi_spec = VirtualMachineInstanceSpec {
            subdomain: Some("mine".to_owned()),
            ..Default::default()
        };
        let mut metadata = ObjectMeta {
            annotations: Some(BTreeMap::from([(
                "shared".to_owned(),
                "target".to_owned(),
            )])),
            ..Default::default()
        };

        apply_preference(&preference, &mut vmi_spec, &mut metadata);

        assert_eq!(vmi_spec.subdomain.as_deref(), Some("mine"));
        assert_eq!(vmi_spec.termination_grace_period_seconds, Some(180));
        assert_eq!(vmi_spec.architecture.as_deref(), Some("arm64"));
        assert_eq!(
            metadata.annotations,
            Some(BTreeMap::from([
                ("from-preference".to_owned(), "true".to_owned()),
                ("shared".to_owned(), "target".to_owned()),
            ]))
        );
    }

    #[test]
    fn empty_preference_is_a_no_op() {
        let mut vmi_spec = VirtualMachineInstanceSpec::default();
        let mut metadata = ObjectMeta::default();

        apply_preference(
            &VirtualMachinePreferenceSpec::default(),
            &mut vmi_spec,
            &mut metadata,
        );

        assert_eq!(vmi_spec, VirtualMachineInstanceSpec::default());
        assert_eq!(metadata, ObjectMeta::default());
    }
}
