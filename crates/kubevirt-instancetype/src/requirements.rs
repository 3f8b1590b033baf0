//! Minimum resources a preference requires from the VirtualMachine using it.
//!
//! The checks run in the order CPU, memory, architecture and stop at the first requirement that
//! isn't met. The returned error carries the conflicting field paths next to the explanation.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, instrument};

use crate::{
    conflict::{Conflict, Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec,
        preference::{
            CpuPreferenceRequirement, MemoryPreferenceRequirement, PreferredCpuTopology,
            SpreadAcross, VirtualMachinePreferenceSpec,
        },
        virtual_machine::{Cpu, VirtualMachineInstanceSpec},
    },
    quantity::{ParseQuantityError, Quantity},
    topology::{preferred_topology, spread_options},
};

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "insufficient CPU resources of {provided} vCPU provided by instance type, preference requires {required} vCPU"
    ))]
    InsufficientInstancetypeCpu { provided: u32, required: u32 },

    #[snafu(display(
        "no CPU resources provided by VirtualMachine, preference requires {required} vCPU"
    ))]
    NoVirtualMachineCpu { required: u32 },

    #[snafu(display(
        "insufficient CPU resources of {provided} vCPU provided by VirtualMachine, preference requires {required} vCPU provided as {provided_as}"
    ))]
    InsufficientVirtualMachineCpu {
        provided: u32,
        required: u32,
        provided_as: String,
    },

    #[snafu(display(
        "insufficient Memory resources of {provided} provided by instance type, preference requires {required}"
    ))]
    InsufficientInstancetypeMemory { provided: String, required: String },

    #[snafu(display(
        "insufficient Memory resources of {provided} provided by VirtualMachine, preference requires {required}"
    ))]
    InsufficientVirtualMachineMemory { provided: String, required: String },

    #[snafu(display("preference requires architecture {required} but {provided} is being requested"))]
    ArchitectureMismatch { provided: String, required: String },

    #[snafu(display("failed to parse memory quantity {quantity:?}"))]
    ParseMemory {
        source: ParseQuantityError,
        quantity: String,
    },
}

/// A requirement of the preference that the VirtualMachine doesn't meet.
#[derive(Debug, Snafu)]
#[snafu(display("{reason}"))]
pub struct RequirementsError {
    conflicts: Conflicts,
    reason: Error,
}

impl RequirementsError {
    fn new(conflicts: impl Into<Conflicts>, reason: Error) -> Self {
        RequirementsSnafu {
            conflicts: conflicts.into(),
            reason,
        }
        .build()
    }

    /// The fields responsible for the failure.
    pub fn conflicts(&self) -> &Conflicts {
        &self.conflicts
    }

    pub fn reason(&self) -> &Error {
        &self.reason
    }
}

/// Checks the requirements of `preference` against the instance type, or the VirtualMachine when
/// there is no instance type.
///
/// `vmi_spec` is the template spec of a VirtualMachine, paths are reported relative to the
/// VirtualMachine object.
#[instrument(skip_all)]
pub fn check_preference_requirements(
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: Option<&VirtualMachinePreferenceSpec>,
    vmi_spec: &VirtualMachineInstanceSpec,
) -> Result<(), RequirementsError> {
    let Some(preference) = preference else {
        return Ok(());
    };
    let Some(requirements) = &preference.requirements else {
        return Ok(());
    };

    if let Some(cpu) = &requirements.cpu {
        check_cpu(instancetype, preference, cpu, vmi_spec)?;
    }
    if let Some(memory) = &requirements.memory {
        check_memory(instancetype, memory, vmi_spec)?;
    }
    if let Some(architecture) = &requirements.architecture {
        check_architecture(architecture, vmi_spec)?;
    }

    debug!("preference requirements are met");
    Ok(())
}

fn template_path() -> FieldPath {
    FieldPath::new(["spec", "template", "spec"])
}

fn instancetype_path() -> FieldPath {
    FieldPath::new(["spec", "instancetype"])
}

fn check_cpu(
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: &VirtualMachinePreferenceSpec,
    requirement: &CpuPreferenceRequirement,
    vmi_spec: &VirtualMachineInstanceSpec,
) -> Result<(), RequirementsError> {
    let required = requirement.guest;

    if let Some(instancetype) = instancetype {
        let provided = instancetype.cpu.guest;
        if provided < required {
            return Err(RequirementsError::new(
                instancetype_path(),
                InsufficientInstancetypeCpuSnafu { provided, required }.build(),
            ));
        }
        return Ok(());
    }

    let cpu_path = template_path().child(["domain", "cpu"]);
    let Some(cpu) = &vmi_spec.domain.cpu else {
        return Err(RequirementsError::new(
            cpu_path,
            NoVirtualMachineCpuSnafu { required }.build(),
        ));
    };

    let axes: &[Axis] = match preferred_topology(Some(preference)) {
        PreferredCpuTopology::Threads => &[Axis::Threads],
        PreferredCpuTopology::Cores => &[Axis::Cores],
        PreferredCpuTopology::Sockets => &[Axis::Sockets],
        PreferredCpuTopology::Spread => match spread_options(Some(preference)).1 {
            SpreadAcross::CoresThreads => &[Axis::Cores, Axis::Threads],
            SpreadAcross::SocketsCoresThreads => &[Axis::Cores, Axis::Sockets, Axis::Threads],
            SpreadAcross::SocketsCores | SpreadAcross::Unknown(_) => &[Axis::Cores, Axis::Sockets],
        },
        PreferredCpuTopology::Any => &[Axis::Cores, Axis::Sockets, Axis::Threads],
        // Rejected during admission
        _ => return Ok(()),
    };

    let provided = axes
        .iter()
        .fold(1, |total: u32, axis| total.saturating_mul(axis.count(cpu)));
    if provided < required {
        let conflicts = axes
            .iter()
            .map(|axis| Conflict::from(cpu_path.child([axis.name()])))
            .collect::<Conflicts>();
        return Err(RequirementsError::new(
            conflicts,
            InsufficientVirtualMachineCpuSnafu {
                provided,
                required,
                provided_as: describe_axes(axes),
            }
            .build(),
        ));
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Axis {
    Cores,
    Sockets,
    Threads,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Self::Cores => "cores",
            Self::Sockets => "sockets",
            Self::Threads => "threads",
        }
    }

    fn count(self, cpu: &Cpu) -> u32 {
        match self {
            Self::Cores => cpu.cores,
            Self::Sockets => cpu.sockets,
            Self::Threads => cpu.threads,
        }
    }
}

/// Renders `[cores, sockets, threads]` as `cores, sockets and threads`.
fn describe_axes(axes: &[Axis]) -> String {
    match axes {
        [] => String::new(),
        [axis] => axis.name().to_owned(),
        [init @ .., last] => {
            let init: Vec<_> = init.iter().map(|axis| axis.name()).collect();
            format!("{} and {}", init.join(", "), last.name())
        }
    }
}

fn parse_memory(quantity: &K8sQuantity, path: &FieldPath) -> Result<Quantity, RequirementsError> {
    Quantity::try_from(quantity)
        .context(ParseMemorySnafu {
            quantity: quantity.0.clone(),
        })
        .map_err(|reason| RequirementsError::new(path.clone(), reason))
}

fn check_memory(
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    requirement: &MemoryPreferenceRequirement,
    vmi_spec: &VirtualMachineInstanceSpec,
) -> Result<(), RequirementsError> {
    let (provided, path) = match instancetype {
        Some(instancetype) => (instancetype.memory.guest.clone(), instancetype_path()),
        None => (
            vmi_spec
                .domain
                .memory
                .as_ref()
                .and_then(|memory| memory.guest.clone())
                .unwrap_or_else(|| K8sQuantity("0".to_owned())),
            template_path().child(["domain", "memory"]),
        ),
    };

    let provided_value = parse_memory(&provided, &path)?;
    let required_value = parse_memory(&requirement.guest, &path)?;
    if provided_value.base_value() >= required_value.base_value() {
        return Ok(());
    }

    let (provided, required) = (provided.0, requirement.guest.0.clone());
    let reason = match instancetype {
        Some(_) => InsufficientInstancetypeMemorySnafu { provided, required }.build(),
        None => InsufficientVirtualMachineMemorySnafu { provided, required }.build(),
    };
    Err(RequirementsError::new(path, reason))
}

fn check_architecture(
    required: &str,
    vmi_spec: &VirtualMachineInstanceSpec,
) -> Result<(), RequirementsError> {
    let provided = vmi_spec.architecture.as_deref().unwrap_or_default();
    if provided == required {
        return Ok(());
    }

    Err(RequirementsError::new(
        template_path().child(["architecture"]),
        ArchitectureMismatchSnafu { provided, required }.build(),
    ))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    fn preference_spec(yaml: &str) -> VirtualMachinePreferenceSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn vmi_spec(yaml: &str) -> VirtualMachineInstanceSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn instancetype_spec(guest: u32, memory: &str) -> VirtualMachineInstancetypeSpec {
        serde_yaml::from_str(&format!("cpu:\n  guest: {guest}\nmemory:\n  guest: {memory}\n"))
            .unwrap()
    }

    #[test]
    fn without_requirements() {
        let preference = preference_spec("preferredSubdomain: cluster");
        assert!(check_preference_requirements(None, None, &vmi_spec("{}")).is_ok());
        assert!(check_preference_requirements(None, Some(&preference), &vmi_spec("{}")).is_ok());
    }

    #[rstest]
    #[case(2, "1Gi", None)]
    #[case(
        1,
        "1Gi",
        Some("insufficient CPU resources of 1 vCPU provided by instance type, preference requires 2 vCPU")
    )]
    #[case(
        2,
        "512Mi",
        Some("insufficient Memory resources of 512Mi provided by instance type, preference requires 1Gi")
    )]
    fn instancetype_requirements(
        #[case] guest: u32,
        #[case] memory: &str,
        #[case] expected: Option<&str>,
    ) {
        let preference = preference_spec(indoc! {"
            requirements:
              cpu:
                guest: 2
              memory:
                guest: 1Gi
        "});
        let result = check_preference_requirements(
            Some(&instancetype_spec(guest, memory)),
            Some(&preference),
            &vmi_spec("{}"),
        );

        match expected {
            None => assert!(result.is_ok()),
            Some(message) => {
                let error = result.unwrap_err();
                assert_eq!(error.to_string(), message);
                assert_eq!(error.conflicts().to_string(), "spec.instancetype");
            }
        }
    }

    #[test]
    fn missing_cpu_block() {
        let preference = preference_spec("requirements:\n  cpu:\n    guest: 2\n");
        let error =
            check_preference_requirements(None, Some(&preference), &vmi_spec("{}")).unwrap_err();

        assert_eq!(
            error.to_string(),
            "no CPU resources provided by VirtualMachine, preference requires 2 vCPU"
        );
        assert_eq!(error.conflicts().to_string(), "spec.template.spec.domain.cpu");
    }

    #[rstest]
    #[case::sockets(
        "sockets",
        "insufficient CPU resources of 1 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as sockets",
        "spec.template.spec.domain.cpu.sockets"
    )]
    #[case::cores(
        "cores",
        "insufficient CPU resources of 2 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as cores",
        "spec.template.spec.domain.cpu.cores"
    )]
    #[case::threads(
        "threads",
        "insufficient CPU resources of 1 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as threads",
        "spec.template.spec.domain.cpu.threads"
    )]
    #[case::spread(
        "spread",
        "insufficient CPU resources of 2 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as cores and sockets",
        "spec.template.spec.domain.cpu.cores, spec.template.spec.domain.cpu.sockets"
    )]
    #[case::legacy_spread(
        "preferSpread",
        "insufficient CPU resources of 2 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as cores and sockets",
        "spec.template.spec.domain.cpu.cores, spec.template.spec.domain.cpu.sockets"
    )]
    #[case::any(
        "any",
        "insufficient CPU resources of 2 vCPU provided by VirtualMachine, preference requires 4 vCPU provided as cores, sockets and threads",
        "spec.template.spec.domain.cpu.cores, spec.template.spec.domain.cpu.sockets, spec.template.spec.domain.cpu.threads"
    )]
    fn insufficient_vm_cpu(
        #[case] topology: &str,
        #[case] message: &str,
        #[case] conflicts: &str,
    ) {
        let preference = preference_spec(&format!(
            "cpu:\n  preferredCPUTopology: {topology}\nrequirements:\n  cpu:\n    guest: 4\n"
        ));
        let vmi_spec = vmi_spec("domain:\n  cpu:\n    sockets: 1\n    cores: 2\n    threads: 1\n");

        let error = check_preference_requirements(None, Some(&preference), &vmi_spec).unwrap_err();

        assert_eq!(error.to_string(), message);
        assert_eq!(error.conflicts().to_string(), conflicts);
    }

    #[test]
    fn spread_requirement_follows_axis() {
        let preference = preference_spec(indoc! {"
            cpu:
              preferredCPUTopology: spread
              spreadOptions:
                across: CoresThreads
            requirements:
              cpu:
                guest: 4
        "});

        let sufficient = vmi_spec("domain:\n  cpu:\n    sockets: 1\n    cores: 2\n    threads: 2\n");
        assert!(check_preference_requirements(None, Some(&preference), &sufficient).is_ok());

        let insufficient = vmi_spec("domain:\n  cpu:\n    sockets: 4\n    cores: 1\n    threads: 2\n");
        let error =
            check_preference_requirements(None, Some(&preference), &insufficient).unwrap_err();
        assert_eq!(
            error.conflicts().to_string(),
            "spec.template.spec.domain.cpu.cores, spec.template.spec.domain.cpu.threads"
        );
    }

    #[rstest]
    #[case("{}", Some("insufficient Memory resources of 0 provided by VirtualMachine, preference requires 1Gi"))]
    #[case(
        "domain:\n  memory:\n    guest: 512Mi\n",
        Some("insufficient Memory resources of 512Mi provided by VirtualMachine, preference requires 1Gi")
    )]
    #[case("domain:\n  memory:\n    guest: 1Gi\n", None)]
    #[case("domain:\n  memory:\n    guest: 2G\n", None)]
    fn vm_memory(#[case] target: &str, #[case] expected: Option<&str>) {
        let preference = preference_spec("requirements:\n  memory:\n    guest: 1Gi\n");
        let result = check_preference_requirements(None, Some(&preference), &vmi_spec(target));

        match expected {
            None => assert!(result.is_ok()),
            Some(message) => {
                let error = result.unwrap_err();
                assert_eq!(error.to_string(), message);
                assert_eq!(error.conflicts().to_string(), "spec.template.spec.domain.memory");
            }
        }
    }

    #[test]
    fn cpu_failure_short_circuits() {
        let preference = preference_spec(indoc! {"
            requirements:
              cpu:
                guest: 8
              memory:
                guest: 8Gi
        "});
        let error = check_preference_requirements(
            Some(&instancetype_spec(2, "1Gi")),
            Some(&preference),
            &vmi_spec("{}"),
        )
        .unwrap_err();

        assert!(matches!(
            error.reason(),
            Error::InsufficientInstancetypeCpu {
                provided: 2,
                required: 8
            }
        ));
    }

    #[rstest]
    #[case(Some("arm64"), true)]
    #[case(Some("amd64"), false)]
    #[case(None, false)]
    fn architecture(#[case] arch: Option<&str>, #[case] met: bool) {
        let preference = preference_spec("requirements:\n  architecture: arm64\n");
        let vmi_spec = VirtualMachineInstanceSpec {
            architecture: arch.map(ToOwned::to_owned),
            ..Default::default()
        };

        let result = check_preference_requirements(None, Some(&preference), &vmi_spec);

        assert_eq!(result.is_ok(), met);
        if let Err(error) = result {
            assert_eq!(error.conflicts().to_string(), "spec.template.spec.architecture");
        }
    }

    #[test]
    fn invalid_memory_quantity() {
        let preference = preference_spec("requirements:\n  memory:\n    guest: lots\n");
        let error = check_preference_requirements(
            Some(&instancetype_spec(1, "1Gi")),
            Some(&preference),
            &vmi_spec("{}"),
        )
        .unwrap_err();

        assert!(matches!(error.reason(), Error::ParseMemory { .. }));
    }
}
