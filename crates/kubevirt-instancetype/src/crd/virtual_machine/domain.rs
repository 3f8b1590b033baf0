use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    crd::{is_false, is_zero},
    merge::{Atomic, Merge},
};

use super::devices::Devices;

/// The resource name used for CPU requests and limits.
pub const RESOURCE_CPU: &str = "cpu";

/// The resource name used for memory requests and limits.
pub const RESOURCE_MEMORY: &str = "memory";

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Machine>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<Firmware>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<Clock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,

    #[serde(default)]
    pub devices: Devices,

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
}

/// Pod level resource requests and limits, keyed by resource name.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, Quantity>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, Quantity>,
}

impl ResourceRequirements {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.limits.is_empty()
    }
}

/// The guest CPU of a VirtualMachineInstance.
///
/// Topology fields use `0` for "unset", the admission layer defaults them to `1` later on.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cores: u32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub sockets: u32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub threads: u32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_sockets: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<CpuFeature>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub dedicated_cpu_placement: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub isolate_emulator_thread: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<Realtime>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct CpuFeature {
    pub name: String,

    /// One of `force`, `require`, `optional`, `disable` or `forbid`. Defaults to `require`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Numa {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_mapping_passthrough: Option<NumaGuestMappingPassthrough>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct NumaGuestMappingPassthrough {}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Realtime {
    /// A range of vCPUs to be excluded from the realtime scheduler, e.g. `0-3,^1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<Quantity>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hugepages {
    /// The size of a single hugepage, e.g. `2Mi` or `1Gi`.
    pub page_size: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IoThreadsPolicy {
    Shared,
    Auto,
    SupplementalPool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskIoThreads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_pool_thread_count: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct LaunchSecurity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sev: Option<Sev>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snp: Option<SevSnp>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Sev {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<SevPolicy>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SevPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_state: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct SevSnp {}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Machine {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Firmware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader: Option<Bootloader>,
}

/// At most one of `bios` and `efi` is expected to be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Bootloader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bios: Option<Bios>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efi: Option<Efi>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bios {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_serial: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Efi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_boot: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Clock {
    #[serde(flatten)]
    pub offset: ClockOffset,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
}

/// Either `utc` or `timezone` is expected to be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct ClockOffset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc: Option<ClockOffsetUtc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ClockOffset {
    pub fn is_unset(&self) -> bool {
        self.utc.is_none() && self.timezone.is_none()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOffsetUtc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Timer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpet: Option<TimerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvm: Option<TimerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pit: Option<TimerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtc: Option<TimerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperv: Option<TimerState>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_policy: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Features {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acpi: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apic: Option<FeatureApic>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperv: Option<FeatureHyperv>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvm: Option<FeatureKvm>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvspinlock: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smm: Option<FeatureState>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct FeatureState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureApic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub end_of_interrupt: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct FeatureKvm {
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct FeatureSpinlocks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, rename = "spinlocks", skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct SyNicTimer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<FeatureState>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct FeatureVendorId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, rename = "vendorid")]
    pub vendor_id: String,
}

/// Hyper-V enlightenments. Each one is merged individually when applying preferences.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub struct FeatureHyperv {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxed: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapic: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spinlocks: Option<FeatureSpinlocks>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpindex: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synic: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synictimer: Option<SyNicTimer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendorid: Option<FeatureVendorId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequencies: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reenlightenment: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlbflush: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipi: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evmcs: Option<FeatureState>,
}

impl Merge for FeatureHyperv {
    fn merge(&mut self, defaults: &Self) {
        self.relaxed.merge(&defaults.relaxed);
        self.vapic.merge(&defaults.vapic);
        self.spinlocks.merge(&defaults.spinlocks);
        self.vpindex.merge(&defaults.vpindex);
        self.runtime.merge(&defaults.runtime);
        self.synic.merge(&defaults.synic);
        self.synictimer.merge(&defaults.synictimer);
        self.reset.merge(&defaults.reset);
        self.vendorid.merge(&defaults.vendorid);
        self.frequencies.merge(&defaults.frequencies);
        self.reenlightenment.merge(&defaults.reenlightenment);
        self.tlbflush.merge(&defaults.tlbflush);
        self.ipi.merge(&defaults.ipi);
        self.evmcs.merge(&defaults.evmcs);
    }
}

impl Atomic for Numa {}
impl Atomic for Realtime {}
impl Atomic for FeatureState {}
impl Atomic for FeatureApic {}
impl Atomic for FeatureKvm {}
impl Atomic for FeatureSpinlocks {}
impl Atomic for SyNicTimer {}
impl Atomic for FeatureVendorId {}
impl Atomic for Timer {}
impl Atomic for Efi {}
