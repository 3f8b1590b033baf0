use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::virtual_machine::{
    DiskIoThreads, Gpu, HostDevice, Hugepages, IoThreadsPolicy, LaunchSecurity, Numa, Realtime,
};

/// A reusable resource shape for VirtualMachines.
///
/// Every field that is set here is mandatory: a VirtualMachine referencing the instance type must
/// not set the same field itself.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineInstancetype",
    plural = "virtualmachineinstancetypes",
    shortname = "vminstancetype",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstancetypeSpec {
    /// Node labels the VirtualMachineInstance has to be scheduled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    pub cpu: CpuInstancetype,

    pub memory: MemoryInstancetype,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<Gpu>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<HostDevice>,

    #[serde(
        default,
        rename = "ioThreadsPolicy",
        skip_serializing_if = "Option::is_none"
    )]
    pub io_threads_policy: Option<IoThreadsPolicy>,

    #[serde(default, rename = "ioThreads", skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<DiskIoThreads>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_security: Option<LaunchSecurity>,

    /// Annotations added to the VirtualMachineInstance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInstancetype {
    /// The number of vCPUs exposed to the guest. The topology is derived from the preference.
    pub guest: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(
        default,
        rename = "dedicatedCPUPlacement",
        skip_serializing_if = "Option::is_none"
    )]
    pub dedicated_cpu_placement: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_emulator_thread: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<Realtime>,

    /// The upper bound of sockets available for CPU hotplug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sockets: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInstancetype {
    pub guest: Quantity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    /// Lowers the pod memory request below the guest memory by this percentage.
    #[serde(default, skip_serializing_if = "crate::crd::is_zero")]
    pub overcommit_percent: u32,

    /// The upper bound of guest memory available for memory hotplug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<Quantity>,
}
