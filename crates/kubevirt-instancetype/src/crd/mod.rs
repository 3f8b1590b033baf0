//! API object types for instance types, preferences and the VirtualMachines they apply to.

use snafu::Snafu;

pub mod instancetype;
pub mod preference;
pub mod virtual_machine;

/// Annotation recording the `VirtualMachineInstancetype` a VirtualMachineInstance was created from.
pub const INSTANCETYPE_ANNOTATION: &str = "kubevirt.io/instancetype-name";
/// Annotation recording the `VirtualMachineClusterInstancetype` a VirtualMachineInstance was created from.
pub const CLUSTER_INSTANCETYPE_ANNOTATION: &str = "kubevirt.io/cluster-instancetype-name";
/// Annotation recording the `VirtualMachinePreference` a VirtualMachineInstance was created from.
pub const PREFERENCE_ANNOTATION: &str = "kubevirt.io/preference-name";
/// Annotation recording the `VirtualMachineClusterPreference` a VirtualMachineInstance was created from.
pub const CLUSTER_PREFERENCE_ANNOTATION: &str = "kubevirt.io/cluster-preference-name";

#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(display("got unexpected kind in {matcher}: {kind}"))]
pub struct UnknownKindError {
    matcher: &'static str,
    kind: String,
}

/// The kind of object an [`InstancetypeMatcher`](virtual_machine::InstancetypeMatcher) refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum::Display)]
pub enum InstancetypeKind {
    #[strum(serialize = "VirtualMachineInstancetype")]
    Namespaced,

    #[strum(serialize = "VirtualMachineClusterInstancetype")]
    Cluster,
}

impl InstancetypeKind {
    /// Parses the `kind` of a matcher case-insensitively, accepting singular and plural names.
    /// An unset or empty kind refers to the cluster wide object.
    pub fn from_matcher_kind(kind: Option<&str>) -> Result<Self, UnknownKindError> {
        match kind.map(str::to_lowercase).as_deref() {
            Some("virtualmachineinstancetype" | "virtualmachineinstancetypes") => {
                Ok(Self::Namespaced)
            }
            None
            | Some(
                "" | "virtualmachineclusterinstancetype" | "virtualmachineclusterinstancetypes",
            ) => Ok(Self::Cluster),
            Some(_) => UnknownKindSnafu {
                matcher: "InstancetypeMatcher",
                kind: kind.unwrap_or_default(),
            }
            .fail(),
        }
    }

    pub fn name_annotation(&self) -> &'static str {
        match self {
            Self::Namespaced => INSTANCETYPE_ANNOTATION,
            Self::Cluster => CLUSTER_INSTANCETYPE_ANNOTATION,
        }
    }
}

/// The kind of object a [`PreferenceMatcher`](virtual_machine::PreferenceMatcher) refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum::Display)]
pub enum PreferenceKind {
    #[strum(serialize = "VirtualMachinePreference")]
    Namespaced,

    #[strum(serialize = "VirtualMachineClusterPreference")]
    Cluster,
}

impl PreferenceKind {
    /// Parses the `kind` of a matcher case-insensitively, accepting singular and plural names.
    /// An unset or empty kind refers to the cluster wide object.
    pub fn from_matcher_kind(kind: Option<&str>) -> Result<Self, UnknownKindError> {
        match kind.map(str::to_lowercase).as_deref() {
            Some("virtualmachinepreference" | "virtualmachinepreferences") => Ok(Self::Namespaced),
            None
            | Some("" | "virtualmachineclusterpreference" | "virtualmachineclusterpreferences") => {
                Ok(Self::Cluster)
            }
            Some(_) => UnknownKindSnafu {
                matcher: "PreferenceMatcher",
                kind: kind.unwrap_or_default(),
            }
            .fail(),
        }
    }

    pub fn name_annotation(&self) -> &'static str {
        match self {
            Self::Namespaced => PREFERENCE_ANNOTATION,
            Self::Cluster => CLUSTER_PREFERENCE_ANNOTATION,
        }
    }
}

// Used by serde's `skip_serializing_if`, which hands out references.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, InstancetypeKind::Cluster)]
    #[case(Some(""), InstancetypeKind::Cluster)]
    #[case(Some("VirtualMachineClusterInstancetype"), InstancetypeKind::Cluster)]
    #[case(Some("virtualmachineinstancetypes"), InstancetypeKind::Namespaced)]
    #[case(Some("VirtualMachineInstancetype"), InstancetypeKind::Namespaced)]
    fn instancetype_matcher_kind(#[case] kind: Option<&str>, #[case] expected: InstancetypeKind) {
        assert_eq!(InstancetypeKind::from_matcher_kind(kind), Ok(expected));
    }

    #[rstest]
    #[case(None, PreferenceKind::Cluster)]
    #[case(Some("virtualmachineclusterpreferences"), PreferenceKind::Cluster)]
    #[case(Some("VirtualMachinePreference"), PreferenceKind::Namespaced)]
    fn preference_matcher_kind(#[case] kind: Option<&str>, #[case] expected: PreferenceKind) {
        assert_eq!(PreferenceKind::from_matcher_kind(kind), Ok(expected));
    }

    #[test]
    fn unknown_matcher_kind() {
        let error = PreferenceKind::from_matcher_kind(Some("Deployment")).unwrap_err();
        assert_eq!(
            error.to_string(),
            "got unexpected kind in PreferenceMatcher: Deployment"
        );
    }
}
