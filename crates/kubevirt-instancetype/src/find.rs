//! Looking up the instance type and preference a VirtualMachine refers to.

use std::collections::BTreeMap;

use kube::ResourceExt as _;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

use crate::crd::{
    InstancetypeKind, PreferenceKind, UnknownKindError,
    instancetype::{VirtualMachineInstancetype, VirtualMachineInstancetypeSpec},
    preference::{VirtualMachinePreference, VirtualMachinePreferenceSpec},
    virtual_machine::VirtualMachine,
};

/// The namespace assumed for objects that don't specify one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display("failed to determine the kind of the referenced object"))]
    UnknownKind { source: UnknownKindError },

    #[snafu(display("{kind} {name:?} not found in namespace {namespace:?}"))]
    NamespacedNotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[snafu(display("{kind} {name:?} not found"))]
    ClusterNotFound { kind: String, name: String },
}

/// Resolves the instance type referenced by a VirtualMachine.
pub trait InstancetypeFinder {
    /// Returns [`None`] when the VirtualMachine doesn't reference an instance type.
    fn find_instancetype_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachineInstancetypeSpec>, Error>;
}

/// Resolves the preference referenced by a VirtualMachine.
pub trait PreferenceFinder {
    /// Returns [`None`] when the VirtualMachine doesn't reference a preference.
    fn find_preference_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachinePreferenceSpec>, Error>;
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct ObjectKey<K> {
    kind: K,
    /// Always [`None`] for cluster wide objects.
    namespace: Option<String>,
    name: String,
}

impl<K> ObjectKey<K> {
    fn new(kind: K, cluster_wide: bool, namespace: Option<&str>, name: &str) -> Self {
        let namespace = (!cluster_wide)
            .then(|| namespace.unwrap_or(DEFAULT_NAMESPACE).to_owned());
        Self {
            kind,
            namespace,
            name: name.to_owned(),
        }
    }
}

/// An in-memory set of instance types and preferences.
///
/// Cluster wide and namespaced objects share the spec types, they only differ in how they are
/// keyed.
#[derive(Clone, Debug, Default)]
pub struct Store {
    instancetypes: BTreeMap<ObjectKey<InstancetypeKind>, VirtualMachineInstancetypeSpec>,
    preferences: BTreeMap<ObjectKey<PreferenceKind>, VirtualMachinePreferenceSpec>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance type. `namespace` is ignored for [`InstancetypeKind::Cluster`].
    pub fn insert_instancetype(
        &mut self,
        kind: InstancetypeKind,
        namespace: Option<&str>,
        name: &str,
        spec: VirtualMachineInstancetypeSpec,
    ) -> &mut Self {
        let key = ObjectKey::new(kind, kind == InstancetypeKind::Cluster, namespace, name);
        self.instancetypes.insert(key, spec);
        self
    }

    /// Adds a preference. `namespace` is ignored for [`PreferenceKind::Cluster`].
    pub fn insert_preference(
        &mut self,
        kind: PreferenceKind,
        namespace: Option<&str>,
        name: &str,
        spec: VirtualMachinePreferenceSpec,
    ) -> &mut Self {
        let key = ObjectKey::new(kind, kind == PreferenceKind::Cluster, namespace, name);
        self.preferences.insert(key, spec);
        self
    }

    pub fn add_instancetype(&mut self, instancetype: VirtualMachineInstancetype) -> &mut Self {
        let namespace = instancetype.namespace();
        let name = instancetype.name_any();
        self.insert_instancetype(
            InstancetypeKind::Namespaced,
            namespace.as_deref(),
            &name,
            instancetype.spec,
        )
    }

    pub fn add_preference(&mut self, preference: VirtualMachinePreference) -> &mut Self {
        let namespace = preference.namespace();
        let name = preference.name_any();
        self.insert_preference(
            PreferenceKind::Namespaced,
            namespace.as_deref(),
            &name,
            preference.spec,
        )
    }
}

impl InstancetypeFinder for Store {
    fn find_instancetype_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachineInstancetypeSpec>, Error> {
        let Some(matcher) = &vm.spec.instancetype else {
            return Ok(None);
        };

        let kind = matcher.resource_kind().context(UnknownKindSnafu)?;
        let namespace = vm.metadata.namespace.as_deref();
        let key = ObjectKey::new(kind, kind == InstancetypeKind::Cluster, namespace, &matcher.name);
        debug!(%kind, name = %matcher.name, "looking up instance type");

        let spec = self
            .instancetypes
            .get(&key)
            .ok_or_else(|| not_found(kind.to_string(), &key))?;
        Ok(Some(spec.clone()))
    }
}

impl PreferenceFinder for Store {
    fn find_preference_spec(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Option<VirtualMachinePreferenceSpec>, Error> {
        let Some(matcher) = &vm.spec.preference else {
            return Ok(None);
        };

        let kind = matcher.resource_kind().context(UnknownKindSnafu)?;
        let namespace = vm.metadata.namespace.as_deref();
        let key = ObjectKey::new(kind, kind == PreferenceKind::Cluster, namespace, &matcher.name);
        debug!(%kind, name = %matcher.name, "looking up preference");

        let spec = self
            .preferences
            .get(&key)
            .ok_or_else(|| not_found(kind.to_string(), &key))?;
        Ok(Some(spec.clone()))
    }
}

fn not_found<K>(kind: String, key: &ObjectKey<K>) -> Error {
    let name = key.name.clone();
    match &key.namespace {
        Some(namespace) => NamespacedNotFoundSnafu {
            kind,
            name,
            namespace: namespace.clone(),
        }
        .build(),
        None => ClusterNotFoundSnafu { kind, name }.build(),
    }
}
