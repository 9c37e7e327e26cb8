//! Differential calculation
//!
//! The differential of an element lists the properties whose current value
//! differs from the baseline. `constraint` and `mapping` are additive in FHIR, so
//! only entries missing from the baseline are listed. `id` and `path` are always
//! present, and so is `sliceName` for slices.
//!
//! A differential can only add or replace values. A property present in the
//! baseline but absent from the current element has no representation and is
//! left out; constraint operations only ever set properties, so this does not
//! arise from them.

use fsh_models::ElementDefinition;
use serde_json::{Map, Value};

/// Properties that are replaced as a whole when they differ.
macro_rules! replaced_properties {
    ($macro:ident) => {
        $macro!(
            extension,
            modifier_extension,
            representation,
            slice_name,
            slice_is_constraining,
            label,
            code,
            slicing,
            short,
            definition,
            comment,
            requirements,
            alias,
            min,
            max,
            base,
            content_reference,
            types,
            default_value,
            meaning_when_missing,
            order_meaning,
            assigned,
            example,
            min_value,
            max_value,
            max_length,
            condition,
            must_support,
            is_modifier,
            is_modifier_reason,
            is_summary,
            binding,
        )
    };
}

/// The properties of `current` that differ from `baseline`, without id and path.
fn changed_properties(current: &ElementDefinition, baseline: &ElementDefinition) -> ElementDefinition {
    let mut diff = ElementDefinition::default();

    macro_rules! copy_changed {
        ($($field:ident),* $(,)?) => {
            $(
                if current.$field.is_some() && current.$field != baseline.$field {
                    diff.$field = current.$field.clone();
                }
            )*
        };
    }
    replaced_properties!(copy_changed);

    diff.constraint = added_entries(&current.constraint, &baseline.constraint);
    diff.mapping = added_entries(&current.mapping, &baseline.mapping);
    diff.primitive_extensions =
        changed_keys(&current.primitive_extensions, &baseline.primitive_extensions);
    diff.other = changed_keys(&current.other, &baseline.other);
    diff
}

fn added_entries<T: PartialEq + Clone>(
    current: &Option<Vec<T>>,
    baseline: &Option<Vec<T>>,
) -> Option<Vec<T>> {
    let current = current.as_ref()?;
    let baseline: &[T] = baseline.as_deref().unwrap_or_default();
    let added: Vec<T> = current
        .iter()
        .filter(|entry| !baseline.contains(entry))
        .cloned()
        .collect();
    (!added.is_empty()).then_some(added)
}

fn changed_keys(current: &Map<String, Value>, baseline: &Map<String, Value>) -> Map<String, Value> {
    current
        .iter()
        .filter(|(key, value)| baseline.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// True when `current` has any property that differs from `baseline`. Without a
/// baseline the element is new and everything counts.
pub fn has_own_diff(current: &ElementDefinition, baseline: Option<&ElementDefinition>) -> bool {
    match baseline {
        Some(baseline) => changed_properties(current, baseline) != ElementDefinition::default(),
        None => true,
    }
}

/// Differential element for `current`.
pub fn calculate_diff(current: &ElementDefinition, baseline: Option<&ElementDefinition>) -> ElementDefinition {
    let Some(baseline) = baseline else {
        return current.clone();
    };
    let mut diff = changed_properties(current, baseline);
    diff.id = current.id.clone();
    diff.path = current.path.clone();
    if current.slice_name.is_some() {
        diff.slice_name = current.slice_name.clone();
    }
    diff
}

/// Apply a differential element on top of a base element: replaced properties
/// overwrite, additive lists are appended.
pub fn apply_diff(base: &ElementDefinition, diff: &ElementDefinition) -> ElementDefinition {
    let mut merged = base.clone();
    merged.id = diff.id.clone();
    merged.path = diff.path.clone();

    macro_rules! overwrite {
        ($($field:ident),* $(,)?) => {
            $(
                if diff.$field.is_some() {
                    merged.$field = diff.$field.clone();
                }
            )*
        };
    }
    replaced_properties!(overwrite);

    if let Some(added) = &diff.constraint {
        merged.constraint.get_or_insert_with(Vec::new).extend(added.iter().cloned());
    }
    if let Some(added) = &diff.mapping {
        merged.mapping.get_or_insert_with(Vec::new).extend(added.iter().cloned());
    }
    for (key, value) in &diff.primitive_extensions {
        merged.primitive_extensions.insert(key.clone(), value.clone());
    }
    for (key, value) in &diff.other {
        merged.other.insert(key.clone(), value.clone());
    }
    merged
}
