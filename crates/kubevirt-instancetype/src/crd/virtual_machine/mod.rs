//! The subset of the `kubevirt.io/v1` API that instance types and preferences are applied to.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{InstancetypeKind, PreferenceKind, UnknownKindError};

pub mod devices;
pub mod domain;

pub use devices::*;
pub use domain::*;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    shortname = "vm",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,

    /// The instance type the template is resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<InstancetypeMatcher>,

    /// The preference the template is resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<PreferenceMatcher>,

    pub template: VirtualMachineInstanceTemplateSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct VirtualMachineInstanceTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
}

/// References a `VirtualMachineInstancetype` or `VirtualMachineClusterInstancetype`.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancetypeMatcher {
    #[serde(default)]
    pub name: String,

    /// Defaults to `VirtualMachineClusterInstancetype` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
}

impl InstancetypeMatcher {
    pub fn resource_kind(&self) -> Result<InstancetypeKind, UnknownKindError> {
        InstancetypeKind::from_matcher_kind(self.kind.as_deref())
    }
}

/// References a `VirtualMachinePreference` or `VirtualMachineClusterPreference`.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceMatcher {
    #[serde(default)]
    pub name: String,

    /// Defaults to `VirtualMachineClusterPreference` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
}

impl PreferenceMatcher {
    pub fn resource_kind(&self) -> Result<PreferenceKind, UnknownKindError> {
        PreferenceKind::from_matcher_kind(self.kind.as_deref())
    }
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    shortname = "vmi",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    #[serde(default)]
    pub domain: DomainSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,

    /// The guest CPU architecture, e.g. `amd64` or `arm64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Network {
    pub name: String,

    #[serde(flatten)]
    pub source: NetworkSource,
}

impl Network {
    pub fn is_pod_network(&self) -> bool {
        self.source.pod.is_some()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct NetworkSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_network_cidr: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    pub network_name: String,

    #[serde(default)]
    pub default: bool,
}
