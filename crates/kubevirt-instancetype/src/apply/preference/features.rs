use crate::{
    crd::{
        preference::FeaturePreferences,
        virtual_machine::{FeatureHyperv, Features},
    },
    merge::Merge,
};

pub(super) fn apply_features(preferences: &FeaturePreferences, features: &mut Option<Features>) {
    let features = features.get_or_insert_with(Features::default);

    features.acpi.merge(&preferences.preferred_acpi);
    features.apic.merge(&preferences.preferred_apic);
    features.kvm.merge(&preferences.preferred_kvm);
    features.pvspinlock.merge(&preferences.preferred_pvspinlock);
    features.smm.merge(&preferences.preferred_smm);

    // Enlightenments are merged one by one, so a target can enable a subset itself
    if let Some(hyperv) = &preferences.preferred_hyperv {
        features
            .hyperv
            .get_or_insert_with(FeatureHyperv::default)
            .merge(hyperv);
    }
}
