//! Derives the guest CPU topology from a vCPU count and a preference.

use tracing::warn;

use crate::crd::preference::{PreferredCpuTopology, SpreadAcross, VirtualMachinePreferenceSpec};

/// The ratio used by [`PreferredCpuTopology::Spread`] when the preference doesn't provide one.
pub const DEFAULT_SPREAD_RATIO: u32 = 2;

/// The number of threads per core used when spreading across sockets, cores and threads.
pub const THREADS_PER_CORE: u32 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CpuTopology {
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

impl Default for CpuTopology {
    fn default() -> Self {
        Self {
            sockets: 1,
            cores: 1,
            threads: 1,
        }
    }
}

impl CpuTopology {
    /// Resolves the topology for `vcpus` using the CPU settings of `preference`.
    pub fn for_preference(vcpus: u32, preference: Option<&VirtualMachinePreferenceSpec>) -> Self {
        let (ratio, across) = spread_options(preference);
        resolve_topology(vcpus, &preferred_topology(preference), ratio, &across)
    }
}

/// The canonical topology requested by `preference`, [`PreferredCpuTopology::Sockets`] by default.
pub fn preferred_topology(preference: Option<&VirtualMachinePreferenceSpec>) -> PreferredCpuTopology {
    preference
        .and_then(|preference| preference.cpu.as_ref())
        .and_then(|cpu| cpu.preferred_cpu_topology.as_ref())
        .map(PreferredCpuTopology::canonical)
        .unwrap_or_default()
}

/// The effective spread ratio and axis of `preference`.
///
/// The ratio is taken from `cpu.spreadOptions.ratio`, falling back to the deprecated
/// `preferSpreadSocketToCoreRatio` and finally [`DEFAULT_SPREAD_RATIO`]. A ratio of `0` counts
/// as unset.
pub fn spread_options(preference: Option<&VirtualMachinePreferenceSpec>) -> (u32, SpreadAcross) {
    let options = preference
        .and_then(|preference| preference.cpu.as_ref())
        .and_then(|cpu| cpu.spread_options.as_ref());

    let ratio = options
        .and_then(|options| options.ratio)
        .or_else(|| preference.and_then(|preference| preference.prefer_spread_socket_to_core_ratio))
        .filter(|ratio| *ratio > 0)
        .unwrap_or(DEFAULT_SPREAD_RATIO);

    let across = options
        .and_then(|options| options.across.clone())
        .unwrap_or_default();

    (ratio, across)
}

/// Lays out `vcpus` according to `topology`.
///
/// The divisions are integer divisions. Admission rejects vCPU counts that don't divide evenly
/// for the requested spread, so no remainder handling happens here.
pub fn resolve_topology(
    vcpus: u32,
    topology: &PreferredCpuTopology,
    spread_ratio: u32,
    spread_across: &SpreadAcross,
) -> CpuTopology {
    let mut resolved = CpuTopology::default();
    if vcpus == 1 {
        return resolved;
    }

    let ratio = if spread_ratio == 0 {
        DEFAULT_SPREAD_RATIO
    } else {
        spread_ratio
    };

    match topology.canonical() {
        PreferredCpuTopology::Cores => resolved.cores = vcpus,
        PreferredCpuTopology::Threads => resolved.threads = vcpus,
        PreferredCpuTopology::Spread => match spread_across {
            SpreadAcross::CoresThreads => {
                resolved.threads = ratio;
                resolved.cores = vcpus / ratio;
            }
            SpreadAcross::SocketsCoresThreads => {
                resolved.threads = THREADS_PER_CORE;
                resolved.cores = ratio;
                resolved.sockets = vcpus / THREADS_PER_CORE / ratio;
            }
            SpreadAcross::SocketsCores => {
                resolved.cores = ratio;
                resolved.sockets = vcpus / ratio;
            }
            SpreadAcross::Unknown(across) => {
                warn!(%across, "unknown spread axis, spreading across sockets and cores");
                resolved.cores = ratio;
                resolved.sockets = vcpus / ratio;
            }
        },
        PreferredCpuTopology::Unknown(topology) => {
            warn!(%topology, "unknown CPU topology, placing all vCPUs on sockets");
            resolved.sockets = vcpus;
        }
        // Deprecated spellings are already mapped by `canonical`
        _ => resolved.sockets = vcpus,
    }

    resolved
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::crd::preference::{CpuPreferences, SpreadOptions};

    fn topology(sockets: u32, cores: u32, threads: u32) -> CpuTopology {
        CpuTopology {
            sockets,
            cores,
            threads,
        }
    }

    #[rstest]
    #[case(6, PreferredCpuTopology::Spread, 2, SpreadAcross::SocketsCores, topology(3, 2, 1))]
    #[case(8, PreferredCpuTopology::Spread, 4, SpreadAcross::SocketsCoresThreads, topology(1, 4, 2))]
    #[case(8, PreferredCpuTopology::Spread, 2, SpreadAcross::CoresThreads, topology(1, 4, 2))]
    #[case(16, PreferredCpuTopology::Spread, 2, SpreadAcross::SocketsCoresThreads, topology(4, 2, 2))]
    #[case(12, PreferredCpuTopology::Spread, 3, SpreadAcross::SocketsCores, topology(4, 3, 1))]
    #[case(4, PreferredCpuTopology::Sockets, 0, SpreadAcross::SocketsCores, topology(4, 1, 1))]
    #[case(4, PreferredCpuTopology::Any, 0, SpreadAcross::SocketsCores, topology(4, 1, 1))]
    #[case(4, PreferredCpuTopology::Cores, 0, SpreadAcross::SocketsCores, topology(1, 4, 1))]
    #[case(4, PreferredCpuTopology::Threads, 0, SpreadAcross::SocketsCores, topology(1, 1, 4))]
    #[case(4, PreferredCpuTopology::DeprecatedPreferCores, 0, SpreadAcross::SocketsCores, topology(1, 4, 1))]
    #[case(4, PreferredCpuTopology::DeprecatedPreferSpread, 0, SpreadAcross::SocketsCores, topology(2, 2, 1))]
    #[case(4, PreferredCpuTopology::Unknown("diagonal".to_owned()), 0, SpreadAcross::SocketsCores, topology(4, 1, 1))]
    fn resolve(
        #[case] vcpus: u32,
        #[case] preferred: PreferredCpuTopology,
        #[case] ratio: u32,
        #[case] across: SpreadAcross,
        #[case] expected: CpuTopology,
    ) {
        assert_eq!(resolve_topology(vcpus, &preferred, ratio, &across), expected);
    }

    #[rstest]
    #[case(PreferredCpuTopology::Cores)]
    #[case(PreferredCpuTopology::Threads)]
    #[case(PreferredCpuTopology::Spread)]
    fn single_vcpu_ignores_topology(#[case] preferred: PreferredCpuTopology) {
        assert_eq!(
            resolve_topology(1, &preferred, 4, &SpreadAcross::SocketsCoresThreads),
            CpuTopology::default()
        );
    }

    #[test]
    fn defaults_without_preference() {
        assert_eq!(preferred_topology(None), PreferredCpuTopology::Sockets);
        assert_eq!(spread_options(None), (2, SpreadAcross::SocketsCores));
        assert_eq!(CpuTopology::for_preference(2, None), topology(2, 1, 1));
    }

    #[rstest]
    #[case(Some(4), Some(3), 4)]
    #[case(None, Some(3), 3)]
    #[case(None, None, DEFAULT_SPREAD_RATIO)]
    #[case(Some(0), None, DEFAULT_SPREAD_RATIO)]
    fn spread_ratio_falls_back_to_legacy_field(
        #[case] ratio: Option<u32>,
        #[case] legacy_ratio: Option<u32>,
        #[case] expected: u32,
    ) {
        let preference = VirtualMachinePreferenceSpec {
            cpu: Some(CpuPreferences {
                preferred_cpu_topology: Some(PreferredCpuTopology::Spread),
                spread_options: Some(SpreadOptions {
                    across: None,
                    ratio,
                }),
                ..Default::default()
            }),
            prefer_spread_socket_to_core_ratio: legacy_ratio,
            ..Default::default()
        };

        assert_eq!(spread_options(Some(&preference)).0, expected);
    }
}
