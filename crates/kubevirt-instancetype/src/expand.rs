//! Expanding VirtualMachines into standalone objects that no longer reference an instance type or
//! preference.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt as _;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, instrument};

use crate::{
    apply::apply_to_vmi,
    conflict::{ConflictsError, FieldPath},
    crd::{
        UnknownKindError, instancetype::VirtualMachineInstancetypeSpec,
        preference::VirtualMachinePreferenceSpec,
        virtual_machine::{VirtualMachine, VirtualMachineInstance},
    },
    find::{self, InstancetypeFinder, PreferenceFinder},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to find instance type"))]
    FindInstancetype { source: find::Error },

    #[snafu(display("failed to find preference"))]
    FindPreference { source: find::Error },

    #[snafu(display("failed to apply instance type and preference"))]
    Apply { source: ConflictsError },

    #[snafu(display("failed to record the instance type name"))]
    InstancetypeNameAnnotation { source: UnknownKindError },

    #[snafu(display("failed to record the preference name"))]
    PreferenceNameAnnotation { source: UnknownKindError },
}

/// Records the instance type a VirtualMachine references in `metadata`.
///
/// The annotation depends on the kind of the matcher, nothing is added without one.
pub fn add_instancetype_name_annotations(
    vm: &VirtualMachine,
    metadata: &mut ObjectMeta,
) -> Result<(), UnknownKindError> {
    let Some(matcher) = &vm.spec.instancetype else {
        return Ok(());
    };

    let annotation = matcher.resource_kind()?.name_annotation();
    metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotation.to_owned(), matcher.name.clone());
    Ok(())
}

/// Records the preference a VirtualMachine references in `metadata`.
pub fn add_preference_name_annotations(
    vm: &VirtualMachine,
    metadata: &mut ObjectMeta,
) -> Result<(), UnknownKindError> {
    let Some(matcher) = &vm.spec.preference else {
        return Ok(());
    };

    let annotation = matcher.resource_kind()?.name_annotation();
    metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotation.to_owned(), matcher.name.clone());
    Ok(())
}

/// Resolves VirtualMachines using the instance types and preferences of its finders.
pub struct Expander<'a, I, P> {
    instancetype_finder: &'a I,
    preference_finder: &'a P,
}

impl<'a, I, P> Expander<'a, I, P>
where
    I: InstancetypeFinder,
    P: PreferenceFinder,
{
    pub fn new(instancetype_finder: &'a I, preference_finder: &'a P) -> Self {
        Self {
            instancetype_finder,
            preference_finder,
        }
    }

    fn find_specs(
        &self,
        vm: &VirtualMachine,
    ) -> Result<
        (
            Option<VirtualMachineInstancetypeSpec>,
            Option<VirtualMachinePreferenceSpec>,
        ),
        Error,
    > {
        let instancetype = self
            .instancetype_finder
            .find_instancetype_spec(vm)
            .context(FindInstancetypeSnafu)?;
        let preference = self
            .preference_finder
            .find_preference_spec(vm)
            .context(FindPreferenceSnafu)?;
        Ok((instancetype, preference))
    }

    /// Returns a copy of `vm` with the instance type and preference applied to its template.
    ///
    /// The matchers are removed from the copy. VirtualMachines without matchers are returned
    /// unchanged.
    #[instrument(skip_all, fields(vm = %vm.name_any()))]
    pub fn expand(&self, vm: &VirtualMachine) -> Result<VirtualMachine, Error> {
        let (instancetype, preference) = self.find_specs(vm)?;
        if instancetype.is_none() && preference.is_none() {
            debug!("VirtualMachine doesn't reference an instance type or preference");
            return Ok(vm.clone());
        }

        let mut expanded = vm.clone();
        let template = &mut expanded.spec.template;
        apply_to_vmi(
            &FieldPath::new(["spec", "template", "spec"]),
            instancetype.as_ref(),
            preference.as_ref(),
            &mut template.spec,
            &mut template.metadata,
        )
        .into_result()
        .context(ApplySnafu)?;

        expanded.spec.instancetype = None;
        expanded.spec.preference = None;
        debug!("expanded VirtualMachine");
        Ok(expanded)
    }

    /// Creates the VirtualMachineInstance a VirtualMachine would start.
    ///
    /// Unlike [`Self::expand`] the resulting object records the names of the instance type and
    /// preference it was created from.
    #[instrument(skip_all, fields(vm = %vm.name_any()))]
    pub fn instantiate(&self, vm: &VirtualMachine) -> Result<VirtualMachineInstance, Error> {
        let (instancetype, preference) = self.find_specs(vm)?;
        let template = &vm.spec.template;

        let mut vmi = VirtualMachineInstance::new(&vm.name_any(), template.spec.clone());
        vmi.metadata = ObjectMeta {
            name: vm.metadata.name.clone(),
            namespace: vm.metadata.namespace.clone(),
            ..template.metadata.clone()
        };

        apply_to_vmi(
            &FieldPath::new(["spec"]),
            instancetype.as_ref(),
            preference.as_ref(),
            &mut vmi.spec,
            &mut vmi.metadata,
        )
        .into_result()
        .context(ApplySnafu)?;

        add_instancetype_name_annotations(vm, &mut vmi.metadata)
            .context(InstancetypeNameAnnotationSnafu)?;
        add_preference_name_annotations(vm, &mut vmi.metadata)
            .context(PreferenceNameAnnotationSnafu)?;

        Ok(vmi)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        crd::{
            CLUSTER_INSTANCETYPE_ANNOTATION, InstancetypeKind, PREFERENCE_ANNOTATION,
            PreferenceKind,
        },
        find::Store,
    };

    #[fixture]
    fn store() -> Store {
        let mut store = Store::new();
        store
            .insert_instancetype(
                InstancetypeKind::Cluster,
                None,
                "u1.medium",
                serde_yaml::from_str("cpu:\n  guest: 2\nmemory:\n  guest: 2Gi\n").unwrap(),
            )
            .insert_preference(
                PreferenceKind::Namespaced,
                Some("tenant"),
                "fedora",
                serde_yaml::from_str(indoc! {"
                    cpu:
                      preferredCPUTopology: cores
                    preferredTerminationGracePeriodSeconds: 30
                "})
                .unwrap(),
            );
        store
    }

    fn vm(yaml: &str) -> VirtualMachine {
        serde_yaml::from_str(yaml).unwrap()
    }

    const VM: &str = indoc! {"
        metadata:
          name: fedora
          namespace: tenant
        spec:
          instancetype:
            name: u1.medium
          preference:
            name: fedora
            kind: VirtualMachinePreference
          template:
            metadata:
              labels:
                app: fedora
            spec: {}
    "};

    #[rstest]
    fn expands_virtual_machine(store: Store) {
        let expander = Expander::new(&store, &store);

        let expanded = expander.expand(&vm(VM)).unwrap();

        assert_eq!(expanded.spec.instancetype, None);
        assert_eq!(expanded.spec.preference, None);
        let spec = &expanded.spec.template.spec;
        let cpu = spec.domain.cpu.as_ref().unwrap();
        assert_eq!((cpu.sockets, cpu.cores, cpu.threads), (1, 2, 1));
        assert_eq!(spec.termination_grace_period_seconds, Some(30));
        assert_eq!(expanded.spec.template.metadata.annotations, None);
    }

    #[rstest]
    fn without_matchers_returns_clone(store: Store) {
        let vm = vm("metadata:\n  name: plain\nspec:\n  template:\n    spec:\n      nodeSelector:\n        a: b\n");
        let expanded = Expander::new(&store, &store).expand(&vm).unwrap();
        assert_eq!(expanded.metadata, vm.metadata);
        assert_eq!(expanded.spec, vm.spec);
    }

    #[rstest]
    fn expand_fails_on_conflicts(store: Store) {
        let vm = vm(indoc! {"
            metadata:
              name: fedora
            spec:
              instancetype:
                name: u1.medium
              template:
                spec:
                  domain:
                    cpu:
                      cores: 4
        "});

        let error = Expander::new(&store, &store).expand(&vm).unwrap_err();

        let Error::Apply { source } = error else {
            panic!("expected conflicts, got {error:?}");
        };
        assert_eq!(
            source.to_string(),
            "VM field(s) spec.template.spec.domain.cpu.cores conflicts with selected instance type"
        );
    }

    #[rstest]
    fn expand_surfaces_finder_errors(store: Store) {
        let vm = vm(indoc! {"
            metadata:
              name: fedora
            spec:
              preference:
                name: debian
              template: {}
        "});

        let error = Expander::new(&store, &store).expand(&vm).unwrap_err();

        let Error::FindPreference { source } = error else {
            panic!("expected a finder error, got {error:?}");
        };
        assert_eq!(
            source,
            find::Error::ClusterNotFound {
                kind: "VirtualMachineClusterPreference".to_owned(),
                name: "debian".to_owned(),
            }
        );
    }

    #[rstest]
    fn instantiates_virtual_machine_instance(store: Store) {
        let vmi = Expander::new(&store, &store).instantiate(&vm(VM)).unwrap();

        assert_eq!(vmi.metadata.name.as_deref(), Some("fedora"));
        assert_eq!(vmi.metadata.namespace.as_deref(), Some("tenant"));
        assert_eq!(
            vmi.metadata.labels,
            Some(BTreeMap::from([("app".to_owned(), "fedora".to_owned())]))
        );
        assert_eq!(
            vmi.metadata.annotations,
            Some(BTreeMap::from([
                (
                    CLUSTER_INSTANCETYPE_ANNOTATION.to_owned(),
                    "u1.medium".to_owned()
                ),
                (PREFERENCE_ANNOTATION.to_owned(), "fedora".to_owned()),
            ]))
        );
        assert_eq!(vmi.spec.domain.cpu.as_ref().map(|cpu| cpu.cores), Some(2));
    }

    #[test]
    fn name_annotations_need_matchers() {
        let mut metadata = ObjectMeta::default();
        let vm = vm("metadata:\n  name: plain\nspec:\n  template: {}\n");

        add_instancetype_name_annotations(&vm, &mut metadata).unwrap();
        add_preference_name_annotations(&vm, &mut metadata).unwrap();

        assert_eq!(metadata, ObjectMeta::default());
    }

    #[test]
    fn name_annotations_reject_unknown_kinds() {
        let mut metadata = ObjectMeta::default();
        let vm = vm(indoc! {"
            metadata:
              name: vm
            spec:
              instancetype:
                name: u1.medium
                kind: Pod
              template: {}
        "});

        let error = add_instancetype_name_annotations(&vm, &mut metadata).unwrap_err();

        assert_eq!(error.to_string(), "got unexpected kind in InstancetypeMatcher: Pod");
        assert_eq!(metadata.annotations, None);
    }
}
