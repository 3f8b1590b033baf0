use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// A value that can be completed from a set of defaults.
///
/// Preferences are soft defaults: a value that is already set on the target always wins, and
/// only unset values are taken over from the preference. Implementations must never overwrite a
/// set value.
///
/// ```
/// # use kubevirt_instancetype::merge::Merge;
/// let mut machine_type: Option<String> = None;
/// machine_type.merge(&Some("q35".to_owned()));
/// assert_eq!(machine_type.as_deref(), Some("q35"));
///
/// machine_type.merge(&Some("pc-i440fx".to_owned()));
/// assert_eq!(machine_type.as_deref(), Some("q35"));
/// ```
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually
pub trait Atomic: Clone {}
impl Atomic for u32 {}
impl Atomic for i32 {}
impl Atomic for i64 {}
impl Atomic for bool {}
impl Atomic for String {}
impl Atomic for Quantity {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            self.clone_from(defaults);
        }
    }
}

/// Inserts every key of `defaults` that is missing from `self`, keeping existing values.
impl<V: Atomic> Merge for BTreeMap<String, V> {
    fn merge(&mut self, defaults: &Self) {
        for (key, value) in defaults {
            self.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::Merge;

    #[test]
    fn option_is_filled_only_when_unset() {
        let mut unset: Option<u32> = None;
        unset.merge(&Some(2));
        assert_eq!(unset, Some(2));

        let mut set = Some(1);
        set.merge(&Some(2));
        assert_eq!(set, Some(1));

        let mut set = Some(1);
        set.merge(&None);
        assert_eq!(set, Some(1));
    }

    #[test]
    fn map_keeps_existing_keys() {
        let mut annotations = BTreeMap::from([("a".to_owned(), "target".to_owned())]);
        Merge::merge(
            &mut annotations,
            &BTreeMap::from([
                ("a".to_owned(), "default".to_owned()),
                ("b".to_owned(), "default".to_owned()),
            ]),
        );

        assert_eq!(
            annotations,
            BTreeMap::from([
                ("a".to_owned(), "target".to_owned()),
                ("b".to_owned(), "default".to_owned()),
            ])
        );
    }
}
