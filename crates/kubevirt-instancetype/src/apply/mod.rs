//! Resolution of a VirtualMachineInstance against an instance type and a preference.
//!
//! [`apply_to_vmi`] mutates the target in place and does not roll back on conflicts. Callers that
//! need the original on failure pass in a clone and throw it away when conflicts are reported.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, instrument};

use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec, preference::VirtualMachinePreferenceSpec,
        virtual_machine::VirtualMachineInstanceSpec,
    },
};

mod instancetype;
mod preference;

pub use instancetype::{apply_instancetype, overcommitted_request};
pub use preference::apply_preference;

/// Applies `instancetype` and then `preference` to the target.
///
/// Conflict paths are rooted at `base`. The preference is only applied when the instance type
/// didn't produce any conflict. With neither an instance type nor a preference the target is
/// left untouched.
#[instrument(skip_all, fields(%base))]
pub fn apply_to_vmi(
    base: &FieldPath,
    instancetype: Option<&VirtualMachineInstancetypeSpec>,
    preference: Option<&VirtualMachinePreferenceSpec>,
    vmi_spec: &mut VirtualMachineInstanceSpec,
    vmi_metadata: &mut ObjectMeta,
) -> Conflicts {
    let conflicts = match instancetype {
        Some(instancetype) => {
            apply_instancetype(base, instancetype, preference, vmi_spec, vmi_metadata)
        }
        None => Conflicts::new(),
    };

    if !conflicts.is_empty() {
        debug!(%conflicts, "instance type conflicts with the target, skipping preference");
        return conflicts;
    }

    if let Some(preference) = preference {
        apply_preference(preference, vmi_spec, vmi_metadata);
    }

    conflicts
}
