use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use tracing::{debug, warn};

use crate::{
    conflict::{Conflicts, FieldPath},
    crd::{
        instancetype::VirtualMachineInstancetypeSpec,
        virtual_machine::{Memory, RESOURCE_MEMORY, VirtualMachineInstanceSpec},
    },
    quantity::{ParseQuantityError, Quantity},
};

const TOTAL_PERCENTAGE: u32 = 100;

/// Copies the guest memory of the instance type.
///
/// The first memory field already set on the target is reported and nothing else is checked.
/// An instance type without guest memory leaves the target alone.
pub(super) fn apply_memory(
    base: &FieldPath,
    instancetype: &VirtualMachineInstancetypeSpec,
    vmi_spec: &mut VirtualMachineInstanceSpec,
) -> Conflicts {
    if instancetype.memory.guest.0.is_empty() {
        return Conflicts::new();
    }

    let domain = base.child(["domain"]);
    let resources = &vmi_spec.domain.resources;

    if vmi_spec.domain.memory.is_some() {
        return domain.child(["memory"]).into();
    }
    if resources.requests.contains_key(RESOURCE_MEMORY) {
        return domain
            .child(["resources", "requests", RESOURCE_MEMORY])
            .into();
    }
    if resources.limits.contains_key(RESOURCE_MEMORY) {
        return domain.child(["resources", "limits", RESOURCE_MEMORY]).into();
    }

    let source = &instancetype.memory;
    vmi_spec.domain.memory = Some(Memory {
        guest: Some(source.guest.clone()),
        hugepages: source.hugepages.clone(),
        max_guest: source.max_guest.clone(),
    });

    if source.overcommit_percent > 0 {
        match overcommitted_request(&source.guest, source.overcommit_percent) {
            Ok(request) => {
                debug!(
                    guest = %source.guest.0,
                    request = %request.0,
                    overcommit_percent = source.overcommit_percent,
                    "lowering memory request for overcommit"
                );
                vmi_spec
                    .domain
                    .resources
                    .requests
                    .insert(RESOURCE_MEMORY.to_owned(), request);
            }
            Err(err) => warn!(
                error = &err as &dyn std::error::Error,
                guest = %source.guest.0,
                "unable to parse guest memory, not setting an overcommitted memory request"
            ),
        }
    }

    Conflicts::new()
}

/// The memory request for `guest` lowered by `percent`, rounded down to whole bytes.
///
/// The result keeps the format (binary, decimal or exponent suffix) of `guest`.
pub fn overcommitted_request(
    guest: &K8sQuantity,
    percent: u32,
) -> Result<K8sQuantity, ParseQuantityError> {
    let guest = Quantity::try_from(guest)?;
    let remaining = i128::from(TOTAL_PERCENTAGE.saturating_sub(percent));
    let bytes = i128::from(guest.to_int_value()) * remaining / i128::from(TOTAL_PERCENTAGE);

    // The result is never larger than the guest memory, which already fitted into an i64
    let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
    Ok(Quantity::from_int_value(bytes, guest.format()))
}
