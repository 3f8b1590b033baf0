//! Admission checks for preferences and for VirtualMachines referencing instance types.
//!
//! Problems are reported as Kubernetes [`StatusCause`]s so they can be embedded into an admission
//! response as they are. Deprecations don't block admission and are reported as warnings.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::StatusCause;
use tracing::{debug, instrument};

use crate::{
    apply::apply_to_vmi,
    conflict::FieldPath,
    crd::{
        instancetype::VirtualMachineInstancetypeSpec,
        preference::{PreferredCpuTopology, SpreadAcross, VirtualMachinePreferenceSpec},
        virtual_machine::VirtualMachine,
    },
    find::{InstancetypeFinder, PreferenceFinder},
    requirements::check_preference_requirements,
    topology::{THREADS_PER_CORE, preferred_topology, spread_options},
};

/// The value of a field is invalid.
pub const CAUSE_FIELD_VALUE_INVALID: &str = "FieldValueInvalid";
/// A referenced value could not be found.
pub const CAUSE_FIELD_VALUE_NOT_FOUND: &str = "FieldValueNotFound";

/// The only spread ratio supported when spreading across cores and threads.
const CORES_THREADS_RATIO: u32 = 2;

/// The outcome of an admission check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Admission {
    /// Reasons for rejecting the object. The object is admitted when this is empty.
    pub causes: Vec<StatusCause>,
    pub warnings: Vec<String>,
}

impl Admission {
    pub fn allowed(&self) -> bool {
        self.causes.is_empty()
    }
}

fn cause(reason: &str, field: impl ToString, message: impl Into<String>) -> StatusCause {
    StatusCause {
        field: Some(field.to_string()),
        message: Some(message.into()),
        reason: Some(reason.to_owned()),
    }
}

/// Validates the CPU settings of a preference.
///
/// Paths of the returned causes are rooted at `base`, usually `spec`.
pub fn validate_preference_spec(
    base: &FieldPath,
    preference: &VirtualMachinePreferenceSpec,
) -> Vec<StatusCause> {
    let mut causes = Vec::new();
    let Some(cpu) = &preference.cpu else {
        return causes;
    };

    let cpu_path = base.child(["cpu"]);
    if let Some(PreferredCpuTopology::Unknown(topology)) = &cpu.preferred_cpu_topology {
        causes.push(cause(
            CAUSE_FIELD_VALUE_INVALID,
            cpu_path.child(["preferredCPUTopology"]),
            format!("unknown preferredCPUTopology {topology}"),
        ));
        return causes;
    }

    if preferred_topology(Some(preference)) != PreferredCpuTopology::Spread {
        return causes;
    }

    let (ratio, across) = spread_options(Some(preference));
    let spread_path = cpu_path.child(["spreadOptions"]);
    match &across {
        SpreadAcross::Unknown(across) => causes.push(cause(
            CAUSE_FIELD_VALUE_INVALID,
            spread_path.child(["across"]),
            format!("unknown spreadOptions.across {across}"),
        )),
        SpreadAcross::CoresThreads if ratio != CORES_THREADS_RATIO => causes.push(cause(
            CAUSE_FIELD_VALUE_INVALID,
            spread_path.child(["ratio"]),
            format!(
                "only a ratio of {CORES_THREADS_RATIO} is supported when spreading across \
                 {across}, got {ratio}"
            ),
        )),
        SpreadAcross::SocketsCores | SpreadAcross::CoresThreads | SpreadAcross::SocketsCoresThreads => {}
    }

    causes
}

/// Rejects instance types whose vCPUs can't be spread evenly as requested by the preference.
///
/// Only applies to the spread topology. Unknown spread axes are left to
/// [`validate_preference_spec`].
pub fn check_spread_cpu_topology(
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: Option<&VirtualMachinePreferenceSpec>,
) -> Vec<StatusCause> {
    let Some(instancetype) = instancetype else {
        return Vec::new();
    };
    if preferred_topology(preference) != PreferredCpuTopology::Spread {
        return Vec::new();
    }

    let guest = instancetype.cpu.guest;
    let (ratio, across) = spread_options(preference);
    let message = match across {
        SpreadAcross::SocketsCores if guest % ratio != 0 => format!(
            "{guest} vCPUs provided by the instance type are not divisible by the \
             Spec.PreferSpreadSocketToCoreRatio or Spec.CPU.PreferSpreadOptions.Ratio of \
             {ratio} provided by the preference"
        ),
        SpreadAcross::CoresThreads if guest % ratio != 0 => format!(
            "{guest} vCPUs provided by the instance type are not divisible by the number of \
             threads per core {ratio}"
        ),
        SpreadAcross::SocketsCoresThreads
            if guest % THREADS_PER_CORE != 0 || (guest / THREADS_PER_CORE) % ratio != 0 =>
        {
            format!(
                "{guest} vCPUs provided by the instance type are not divisible by the number of \
                 threads per core {THREADS_PER_CORE} and Spec.PreferSpreadSocketToCoreRatio or \
                 Spec.CPU.PreferSpreadOptions.Ratio of {ratio}"
            )
        }
        _ => return Vec::new(),
    };

    vec![cause(
        CAUSE_FIELD_VALUE_INVALID,
        "instancetype.spec.cpu.guest",
        message,
    )]
}

/// Lists the deprecated fields and spellings used by a preference.
pub fn deprecation_warnings(preference: &VirtualMachinePreferenceSpec) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(topology) = preference
        .cpu
        .as_ref()
        .and_then(|cpu| cpu.preferred_cpu_topology.as_ref())
        && let Some(replacement) = topology.replacement()
    {
        warnings.push(format!(
            "PreferredCPUTopology {topology} is deprecated for removal in a future release, \
             please use {replacement} instead"
        ));
    }

    if preference.prefer_spread_socket_to_core_ratio.is_some() {
        warnings.push(
            "PreferSpreadSocketToCoreRatio is deprecated for removal in a future release, please \
             use Spec.CPU.SpreadOptions.Ratio instead"
                .to_owned(),
        );
    }

    if let Some(firmware) = &preference.firmware {
        if firmware.deprecated_preferred_use_efi.is_some() {
            warnings.push(
                "PreferredUseEfi is deprecated for removal in a future release, please use \
                 PreferredEfi instead"
                    .to_owned(),
            );
        }
        if firmware.deprecated_preferred_use_secure_boot.is_some() {
            warnings.push(
                "PreferredUseSecureBoot is deprecated for removal in a future release, please \
                 use PreferredEfi instead"
                    .to_owned(),
            );
        }
    }

    warnings
}

/// Admits a `VirtualMachinePreference`.
pub fn admit_preference(preference: &VirtualMachinePreferenceSpec) -> Admission {
    Admission {
        causes: validate_preference_spec(&FieldPath::new(["spec"]), preference),
        warnings: deprecation_warnings(preference),
    }
}

/// Admits a VirtualMachine by resolving a copy of its template.
///
/// The referenced objects are looked up first. The spread topology is checked before resolving,
/// resolution conflicts are reported per field and the preference requirements are checked
/// against the resolved copy last. Each stage only runs when the previous one passed.
#[instrument(skip_all, fields(vm = ?vm.metadata.name))]
pub fn admit_virtual_machine(
    vm: &VirtualMachine,
    instancetype_finder: &impl InstancetypeFinder,
    preference_finder: &impl PreferenceFinder,
) -> Admission {
    let mut admission = Admission::default();

    let instancetype = match instancetype_finder.find_instancetype_spec(vm) {
        Ok(instancetype) => instancetype,
        Err(err) => {
            admission.causes.push(cause(
                CAUSE_FIELD_VALUE_NOT_FOUND,
                "spec.instancetype",
                format!("Failure to find instancetype: {err}"),
            ));
            return admission;
        }
    };
    let preference = match preference_finder.find_preference_spec(vm) {
        Ok(preference) => preference,
        Err(err) => {
            admission.causes.push(cause(
                CAUSE_FIELD_VALUE_NOT_FOUND,
                "spec.preference",
                format!("Failure to find preference: {err}"),
            ));
            return admission;
        }
    };

    if let Some(preference) = &preference {
        admission.warnings = deprecation_warnings(preference);
    }
    if instancetype.is_none() && preference.is_none() {
        return admission;
    }

    admission.causes = check_spread_cpu_topology(instancetype.as_ref(), preference.as_ref());
    if !admission.allowed() {
        return admission;
    }

    let mut template = vm.spec.template.clone();
    let conflicts = apply_to_vmi(
        &FieldPath::new(["spec", "template", "spec"]),
        instancetype.as_ref(),
        preference.as_ref(),
        &mut template.spec,
        &mut template.metadata,
    );
    if !conflicts.is_empty() {
        debug!(%conflicts, "rejecting VirtualMachine conflicting with its instance type");
        admission.causes = conflicts
            .iter()
            .map(|conflict| {
                cause(
                    CAUSE_FIELD_VALUE_INVALID,
                    conflict,
                    format!("VM field {conflict} conflicts with selected instance type"),
                )
            })
            .collect();
        return admission;
    }

    if let Err(err) =
        check_preference_requirements(instancetype.as_ref(), preference.as_ref(), &template.spec)
    {
        admission.causes.push(cause(
            CAUSE_FIELD_VALUE_NOT_FOUND,
            err.conflicts(),
            format!("failure checking preference requirements: {err}"),
        ));
    }

    admission
}
