//! Sequential rule driver
//!
//! Applies a batch of rules to a StructureDefinition in order. A rule that fails
//! is reported as an error diagnostic at its source location and leaves the
//! definition as it was; the remaining rules still run.

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::path::resolve_soft_indexing;
use crate::rules::{ContainsItem, Rule};
use crate::structure::StructureDefinition;
use crate::tree::last_segment;
use fsh_context::{FishKind, Fishable};
use fsh_models::ElementDefinitionType;

const TYPE_KINDS: &[FishKind] = &[
    FishKind::Resource,
    FishKind::Type,
    FishKind::Profile,
    FishKind::Logical,
];

/// Apply `rules` to `sd` in order. Soft indices in the rule paths are resolved
/// first, so the rules are updated in place.
pub fn apply_rules(
    sd: &mut StructureDefinition,
    rules: &mut [Rule],
    fisher: &dyn Fishable,
    diagnostics: &mut Diagnostics,
) {
    resolve_soft_indexing(rules, diagnostics);

    for rule in rules.iter() {
        diagnostics.set_source(Some(rule.source().clone()));
        tracing::debug!(rule = rule.name(), path = rule.path(), "applying rule");

        if let Rule::Contains(contains) = rule {
            for item in &contains.items {
                let result = sd.transaction(diagnostics, |sd, diagnostics| {
                    let id = sd.find_element_by_path(&contains.path, fisher, diagnostics)?;
                    add_contained_slice(sd, &id, item, fisher, diagnostics)
                });
                if let Err(e) = result {
                    diagnostics.error(&contains.path, e.to_string());
                }
            }
            continue;
        }

        let result = sd.transaction(diagnostics, |sd, diagnostics| {
            apply_rule(sd, rule, fisher, diagnostics)
        });
        if let Err(e) = result {
            diagnostics.error(rule.path(), e.to_string());
        }
    }
    diagnostics.set_source(None);
}

fn apply_rule(
    sd: &mut StructureDefinition,
    rule: &Rule,
    fisher: &dyn Fishable,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    if let Rule::CaretValue(caret) = rule {
        let id = match caret.path.trim() {
            "" | "." => None,
            path => Some(sd.find_element_by_path(path, fisher, diagnostics)?),
        };
        return sd.set_caret_value(id.as_deref(), &caret.caret_path, &caret.value, fisher, diagnostics);
    }

    let id = sd.find_element_by_path(rule.path(), fisher, diagnostics)?;
    match rule {
        Rule::Card(card) => sd.constrain_cardinality(&id, card.min, card.max, diagnostics),
        Rule::Flag(flag) => sd.apply_flags(&id, &flag.flags, diagnostics),
        Rule::Only(only) => sd.constrain_type(&id, &only.types, None, fisher, diagnostics),
        Rule::Binding(binding) => {
            sd.bind_to_value_set(&id, &binding.value_set, binding.strength, fisher, diagnostics)
        }
        Rule::Assignment(assignment) => {
            sd.assign_value(&id, &assignment.value, assignment.exactly, fisher, diagnostics)
        }
        Rule::Contains(_) | Rule::CaretValue(_) => Ok(()),
    }
}

/// Add one slice of a contains rule. On extension elements the item names an
/// extension (or gives its type with `named`), and the slice is typed with it.
fn add_contained_slice(
    sd: &mut StructureDefinition,
    id: &str,
    item: &ContainsItem,
    fisher: &dyn Fishable,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let element_name = last_segment(id).split(':').next().unwrap_or_default();
    let slice_type = if matches!(element_name, "extension" | "modifierExtension") {
        let extension = item.type_name.as_deref().unwrap_or(&item.name);
        let md = fisher
            .fish_for_metadata(extension, &[FishKind::Extension])
            .ok_or_else(|| Error::DefinitionNotFound {
                item: extension.to_string(),
            })?;
        let profiles = md.url.into_iter().collect();
        Some(ElementDefinitionType::new("Extension").with_profiles(profiles))
    } else {
        match item.type_name.as_deref() {
            Some(type_name) => {
                let md = fisher
                    .fish_for_metadata(type_name, TYPE_KINDS)
                    .ok_or_else(|| Error::DefinitionNotFound {
                        item: type_name.to_string(),
                    })?;
                let code = md.type_code().unwrap_or(type_name).to_string();
                let mut slice_type = ElementDefinitionType::new(code);
                if md.is_constraint() {
                    slice_type = slice_type.with_profiles(md.url.into_iter().collect());
                }
                Some(slice_type)
            }
            None => None,
        }
    };

    let slice_id = sd.add_slice(id, &item.name, slice_type)?;
    if item.min.is_some() || item.max.is_some() {
        sd.constrain_cardinality(&slice_id, item.min, item.max, diagnostics)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Severity, SourceInfo};
    use crate::rules::{CardRule, CaretValueRule, ContainsRule, FlagRule, Flags};
    use crate::value::FshValue;
    use fsh_context::testing::{core_index, example_url};
    use fsh_models::Max;
    use pretty_assertions::assert_eq;

    fn observation() -> StructureDefinition {
        let index = core_index();
        StructureDefinition::fish(&index, "Observation")
            .unwrap()
            .derive_profile("p", "P", &example_url("p"))
    }

    fn source(file: &str) -> SourceInfo {
        SourceInfo {
            file: Some(file.into()),
            location: None,
        }
    }

    #[test]
    fn failing_rules_are_reported_and_skipped() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        let mut rules = vec![
            Rule::Card(CardRule {
                path: "subject".into(),
                min: Some(1),
                max: None,
                source: SourceInfo::default(),
            }),
            Rule::Card(CardRule {
                path: "status".into(),
                min: Some(0),
                max: None,
                source: source("bad.fsh"),
            }),
            Rule::Flag(FlagRule {
                path: "code".into(),
                flags: Flags::must_support(),
                source: SourceInfo::default(),
            }),
        ];
        apply_rules(&mut sd, &mut rules, &index, &mut diagnostics);

        assert_eq!(sd.find_element("Observation.subject").unwrap().min, Some(1));
        assert_eq!(sd.find_element("Observation.status").unwrap().min, Some(1));
        assert_eq!(sd.find_element("Observation.code").unwrap().must_support, Some(true));

        let errors: Vec<_> = diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].element.as_deref(), Some("status"));
        assert_eq!(errors[0].source, Some(source("bad.fsh")));
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn contains_rules_add_typed_extension_slices() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        let mut rules = vec![Rule::Contains(ContainsRule {
            path: "extension".into(),
            items: vec![
                ContainsItem {
                    name: "my-extension".into(),
                    type_name: None,
                    min: Some(0),
                    max: Some(Max::Bounded(1)),
                },
                ContainsItem {
                    name: "mine".into(),
                    type_name: Some("MyExtension".into()),
                    min: None,
                    max: None,
                },
                ContainsItem {
                    name: "unknown".into(),
                    type_name: None,
                    min: None,
                    max: None,
                },
            ],
            source: SourceInfo::default(),
        })];
        apply_rules(&mut sd, &mut rules, &index, &mut diagnostics);

        let slice = sd.find_element("Observation.extension:my-extension").unwrap();
        assert_eq!(slice.max, Some(Max::Bounded(1)));
        assert_eq!(slice.types()[0].profiles(), &[example_url("my-extension")]);
        assert!(sd.find_element("Observation.extension:mine").is_some());
        assert!(sd.find_element("Observation.extension:unknown").is_none());
        assert_eq!(diagnostics.errors().count(), 1);
    }

    #[test]
    fn caret_rules_target_elements_or_the_definition() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        let mut rules = vec![
            Rule::CaretValue(CaretValueRule {
                path: "code".into(),
                caret_path: "short".into(),
                value: FshValue::String("What was observed".into()),
                source: SourceInfo::default(),
            }),
            Rule::CaretValue(CaretValueRule {
                path: String::new(),
                caret_path: "title".into(),
                value: FshValue::String("My Observation".into()),
                source: SourceInfo::default(),
            }),
        ];
        apply_rules(&mut sd, &mut rules, &index, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        assert_eq!(
            sd.find_element("Observation.code").unwrap().short.as_deref(),
            Some("What was observed")
        );
        assert_eq!(sd.header().title.as_deref(), Some("My Observation"));
    }
}
