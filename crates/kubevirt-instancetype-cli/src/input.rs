//! Loading API objects from multi-document YAML files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use kubevirt_instancetype::{
    crd::{
        InstancetypeKind, PreferenceKind, preference::VirtualMachinePreferenceSpec,
        virtual_machine::VirtualMachine,
    },
    find::Store,
    k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use serde::{Deserialize, de::DeserializeOwned};
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::debug;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse YAML document in {}", path.display()))]
    ParseDocument {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {kind} in {}", path.display()))]
    ParseObject {
        source: serde_yaml::Error,
        kind: String,
        path: PathBuf,
    },

    #[snafu(display("document in {} has no kind", path.display()))]
    MissingKind { path: PathBuf },

    #[snafu(display("unsupported kind {kind} in {}", path.display()))]
    UnsupportedKind { kind: String, path: PathBuf },
}

/// The parts of an API object this tool cares about.
#[derive(Deserialize)]
struct Object<S> {
    #[serde(default)]
    metadata: ObjectMeta,
    spec: S,
}

/// A preference together with the name it was declared with.
#[derive(Clone, Debug)]
pub struct NamedPreference {
    pub kind: PreferenceKind,
    pub name: String,
    pub spec: VirtualMachinePreferenceSpec,
}

/// Everything read from the input files.
#[derive(Debug, Default)]
pub struct Inputs {
    pub store: Store,
    pub virtual_machines: Vec<VirtualMachine>,
    pub preferences: Vec<NamedPreference>,
}

impl Inputs {
    pub fn load<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self, Error> {
        let mut inputs = Self::default();
        for path in paths {
            inputs.load_file(path.as_ref())?;
        }
        Ok(inputs)
    }

    fn load_file(&mut self, path: &Path) -> Result<(), Error> {
        let content = fs::read_to_string(path).context(ReadFileSnafu { path })?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = serde_yaml::Value::deserialize(document).context(ParseDocumentSnafu { path })?;
            if value.is_null() {
                continue;
            }
            self.add(value, path)?;
        }
        Ok(())
    }

    fn add(&mut self, value: serde_yaml::Value, path: &Path) -> Result<(), Error> {
        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .filter(|kind| !kind.is_empty())
            .context(MissingKindSnafu { path })?
            .to_owned();
        debug!(%kind, path = %path.display(), "loading object");

        if let Ok(instancetype_kind) = InstancetypeKind::from_matcher_kind(Some(&kind)) {
            let object: Object<_> = parse(value, &kind, path)?;
            self.store.insert_instancetype(
                instancetype_kind,
                object.metadata.namespace.as_deref(),
                &name(&object.metadata),
                object.spec,
            );
        } else if let Ok(preference_kind) = PreferenceKind::from_matcher_kind(Some(&kind)) {
            let object: Object<VirtualMachinePreferenceSpec> = parse(value, &kind, path)?;
            let name = name(&object.metadata);
            self.store.insert_preference(
                preference_kind,
                object.metadata.namespace.as_deref(),
                &name,
                object.spec.clone(),
            );
            self.preferences.push(NamedPreference {
                kind: preference_kind,
                name,
                spec: object.spec,
            });
        } else if kind == "VirtualMachine" {
            let object: Object<_> = parse(value, &kind, path)?;
            self.virtual_machines.push(VirtualMachine {
                metadata: object.metadata,
                spec: object.spec,
            });
        } else {
            return UnsupportedKindSnafu { kind, path }.fail();
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(value: serde_yaml::Value, kind: &str, path: &Path) -> Result<T, Error> {
    serde_yaml::from_value(value).context(ParseObjectSnafu { kind, path })
}

fn name(metadata: &ObjectMeta) -> String {
    metadata.name.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use indoc::indoc;
    use kubevirt_instancetype::find::{InstancetypeFinder as _, PreferenceFinder as _};

    use super::*;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_multiple_documents() {
        let file = write_file(indoc! {"
            apiVersion: instancetype.kubevirt.io/v1beta1
            kind: VirtualMachineClusterInstancetype
            metadata:
              name: u1.small
            spec:
              cpu:
                guest: 1
              memory:
                guest: 2Gi
            ---
            apiVersion: instancetype.kubevirt.io/v1beta1
            kind: VirtualMachinePreference
            metadata:
              name: fedora
              namespace: tenant
            spec:
              preferredSubdomain: fedora
            ---
            apiVersion: kubevirt.io/v1
            kind: VirtualMachine
            metadata:
              name: vm
              namespace: tenant
            spec:
              instancetype:
                name: u1.small
              preference:
                name: fedora
                kind: VirtualMachinePreference
              template: {}
        "});

        let inputs = Inputs::load([file.path()]).unwrap();

        assert_eq!(inputs.virtual_machines.len(), 1);
        assert_eq!(inputs.preferences.len(), 1);
        assert_eq!(inputs.preferences[0].kind, PreferenceKind::Namespaced);
        let vm = &inputs.virtual_machines[0];
        let instancetype = inputs.store.find_instancetype_spec(vm).unwrap().unwrap();
        assert_eq!(instancetype.cpu.guest, 1);
        let preference = inputs.store.find_preference_spec(vm).unwrap().unwrap();
        assert_eq!(preference.preferred_subdomain.as_deref(), Some("fedora"));
    }

    #[test]
    fn skips_empty_documents() {
        let file = write_file("---\n---\n");
        let inputs = Inputs::load([file.path()]).unwrap();
        assert!(inputs.virtual_machines.is_empty());
    }

    #[test]
    fn rejects_unsupported_kinds() {
        let file = write_file("kind: Pod\nmetadata:\n  name: pod\nspec: {}\n");

        let error = Inputs::load([file.path()]).unwrap_err();

        assert!(matches!(error, Error::UnsupportedKind { kind, .. } if kind == "Pod"));
    }

    #[test]
    fn rejects_documents_without_kind() {
        let file = write_file("metadata:\n  name: nameless\n");
        let error = Inputs::load([file.path()]).unwrap_err();
        assert!(matches!(error, Error::MissingKind { .. }));
    }
}
