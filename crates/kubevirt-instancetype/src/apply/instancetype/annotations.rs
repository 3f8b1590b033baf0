use std::collections::{BTreeMap, btree_map::Entry};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::conflict::{Conflict, Conflicts};

/// Adds the instance type annotations to `metadata`.
///
/// An annotation that is already present with the same value is fine. A different value is a
/// conflict at `annotations.<key>`, and the remaining annotations are still applied.
pub(super) fn apply_annotations(
    annotations: &BTreeMap<String, String>,
    metadata: &mut ObjectMeta,
) -> Conflicts {
    let mut conflicts = Conflicts::new();
    if annotations.is_empty() {
        return conflicts;
    }

    let target = metadata.annotations.get_or_insert_with(BTreeMap::new);
    for (key, value) in annotations {
        match target.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
            }
            Entry::Occupied(entry) if entry.get() != value => {
                conflicts.push(Conflict::new(["annotations", key.as_str()]).with_message(format!(
                    "annotation is set to {existing:?}, the instance type requires {value:?}",
                    existing = entry.get()
                )));
            }
            Entry::Occupied(_) => {}
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn fills_missing_annotations() {
        let mut metadata = ObjectMeta::default();
        let conflicts = apply_annotations(&annotations(&[("a", "1"), ("b", "2")]), &mut metadata);

        assert!(conflicts.is_empty());
        assert_eq!(metadata.annotations, Some(annotations(&[("a", "1"), ("b", "2")])));
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let mut metadata = ObjectMeta {
            annotations: Some(annotations(&[("a", "1")])),
            ..Default::default()
        };
        let conflicts = apply_annotations(&annotations(&[("a", "1")]), &mut metadata);

        assert!(conflicts.is_empty());
        assert_eq!(metadata.annotations, Some(annotations(&[("a", "1")])));
    }

    #[test]
    fn differing_values_conflict_and_scanning_continues() {
        let mut metadata = ObjectMeta {
            annotations: Some(annotations(&[("a", "0"), ("c", "0")])),
            ..Default::default()
        };
        let conflicts = apply_annotations(
            &annotations(&[("a", "1"), ("b", "2"), ("c", "3")]),
            &mut metadata,
        );

        assert_eq!(conflicts.to_string(), "annotations.a, annotations.c");
        assert_eq!(
            metadata.annotations,
            Some(annotations(&[("a", "0"), ("b", "2"), ("c", "0")]))
        );
    }

    #[test]
    fn empty_annotations_leave_metadata_alone() {
        let mut metadata = ObjectMeta::default();
        assert!(apply_annotations(&BTreeMap::new(), &mut metadata).is_empty());
        assert_eq!(metadata.annotations, None);
    }
}
