use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::rules::OnlyRuleType;
use crate::structure::StructureDefinition;
use crate::tree::last_segment;
use fsh_context::{lineage, FishKind, Fishable, LineageOptions, Metadata};
use fsh_models::{ElementDefinitionType, Max};

/// One existing type of the element matched by one `only` alternative, and the
/// narrower type that replaces it.
#[derive(Debug, Clone)]
struct TypeMatch {
    index: usize,
    new_type: ElementDefinitionType,
}

/// The part of an existing type an `only` rule is limited to, when the rule path
/// names one type of a choice (`value[x] only ...` applied to `valueQuantity`).
#[derive(Debug, Clone)]
struct TypeTarget {
    index: usize,
    /// A profile or target profile of the type the filter named, replaced in place.
    entry: Option<String>,
}

impl StructureDefinition {
    /// Narrow the types of an element to the alternatives of an `only` rule.
    ///
    /// Each alternative must be the same as, or a descendant of, one of the current
    /// types. Current types no alternative matches are removed. With `target`,
    /// only the type (or the profile of a type) named by it is narrowed and the
    /// other types stay as they are.
    pub fn constrain_type(
        &mut self,
        id: &str,
        rule_types: &[OnlyRuleType],
        target: Option<&str>,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        self.transaction(diagnostics, |sd, diagnostics| {
            sd.narrow_types(id, rule_types, target, fisher, diagnostics)
        })
    }

    fn narrow_types(
        &mut self,
        id: &str,
        rule_types: &[OnlyRuleType],
        target: Option<&str>,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let element = self.element(id)?.clone();
        let current = element.types().to_vec();
        let target = match target {
            Some(name) => Some(find_target(&current, name, fisher).ok_or_else(|| Error::InvalidType {
                element: id.to_string(),
                type_name: name.to_string(),
                allowed: type_list(&current),
            })?),
            None => None,
        };
        let candidates = candidate_types(&current, target.as_ref());

        let lineages = rule_types
            .iter()
            .map(|rule_type| {
                let lineage = lineage(
                    fisher,
                    &rule_type.type_name,
                    LineageOptions {
                        include_imposed: true,
                    },
                );
                if lineage.is_empty() {
                    Err(Error::TypeNotFound {
                        type_name: rule_type.type_name.clone(),
                    })
                } else {
                    Ok(lineage)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut matches = Vec::new();
        for (rule_type, lineage) in rule_types.iter().zip(&lineages) {
            let found = match_rule_type(&candidates, rule_type, lineage, id)?.ok_or_else(|| {
                Error::InvalidType {
                    element: id.to_string(),
                    type_name: rule_type.type_name.clone(),
                    allowed: type_list(&candidates),
                }
            })?;
            matches.push(found);
        }

        let new_types = assemble_types(&current, &candidates, &matches, target.as_ref());
        self.report_removed_choices(id, &current, &new_types, diagnostics);
        for new_type in &new_types {
            self.check_extension_placement(id, new_type, fisher, diagnostics);
        }

        // Type slices of a choice are constrained by their own rules.
        let own_slice_prefix = format!("{}:", id);
        let connected: Vec<String> = self
            .propagation_targets(id)
            .into_iter()
            .filter(|c| !(element.is_choice_type() && c.starts_with(&own_slice_prefix)))
            .collect();
        let mut connected_updates = Vec::new();
        for connected_id in connected {
            let connected = self.element(&connected_id)?;
            let connected_types = connected.types().to_vec();
            let mut connected_matches = Vec::new();
            for (rule_type, lineage) in rule_types.iter().zip(&lineages) {
                match match_rule_type(&connected_types, rule_type, lineage, &connected_id) {
                    Ok(Some(found)) => connected_matches.push(found),
                    _ => connected_matches
                        .extend(match_narrower(&connected_types, rule_type, lineage, fisher)),
                }
            }
            if connected_matches.is_empty() {
                if connected.max == Some(Max::Bounded(0)) {
                    diagnostics.warn(
                        &connected_id,
                        format!(
                            "No type of {} is left after constraining {}, but it is prohibited so it is left unchanged",
                            connected_id, id
                        ),
                    );
                    continue;
                }
                return Err(Error::EmptyConnectedTypes {
                    element: id.to_string(),
                    connected: connected_id,
                });
            }
            let narrowed = assemble_types(&connected_types, &connected_types, &connected_matches, None);
            connected_updates.push((connected_id, narrowed));
        }

        if new_types != current {
            self.element_mut(id)?.types = Some(new_types);
        }
        for (connected_id, narrowed) in connected_updates {
            let connected = self.element_mut(&connected_id)?;
            if connected.types() != narrowed.as_slice() {
                connected.types = Some(narrowed);
            }
        }
        Ok(())
    }

    /// Warn about type slices of a choice whose type was just removed.
    fn report_removed_choices(
        &self,
        id: &str,
        current: &[ElementDefinitionType],
        new_types: &[ElementDefinitionType],
        diagnostics: &mut Diagnostics,
    ) {
        let removed: Vec<&str> = current
            .iter()
            .filter(|t| !new_types.iter().any(|n| n.code == t.code))
            .map(|t| t.code.as_str())
            .collect();
        if removed.is_empty() {
            return;
        }
        for slice_id in self.elements().direct_slices(id) {
            let Some(slice) = self.find_element(&slice_id) else {
                continue;
            };
            if slice.types().iter().any(|t| removed.contains(&t.code.as_str())) {
                diagnostics.warn(
                    &slice_id,
                    format!(
                        "Slice {} is obsolete: its type is no longer allowed on {}",
                        slice_id, id
                    ),
                );
            }
        }
    }

    /// Extensions only go to `extension`, modifier extensions only to
    /// `modifierExtension`. A misplaced one is reported but kept.
    fn check_extension_placement(
        &self,
        id: &str,
        new_type: &ElementDefinitionType,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) {
        if new_type.code != "Extension" {
            return;
        }
        let name = last_segment(id).split(':').next().unwrap_or_default();
        for profile in new_type.profiles() {
            let Some(extension) = fisher.fish_for_structure(profile, &[FishKind::Extension]) else {
                continue;
            };
            let is_modifier = extension
                .snapshot
                .as_ref()
                .and_then(|s| s.element.first())
                .and_then(|root| root.is_modifier)
                .unwrap_or(false);
            match (name, is_modifier) {
                ("extension", true) => diagnostics.error(
                    id,
                    format!(
                        "Modifier extension {} cannot be used on {}, use modifierExtension instead",
                        profile, id
                    ),
                ),
                ("modifierExtension", false) => diagnostics.error(
                    id,
                    format!(
                        "Extension {} is not a modifier extension and cannot be used on {}",
                        profile, id
                    ),
                ),
                _ => {}
            }
        }
    }
}

/// Locate the type a target filter names: by code, by profile or by target profile.
fn find_target(types: &[ElementDefinitionType], name: &str, fisher: &dyn Fishable) -> Option<TypeTarget> {
    if let Some(index) = types.iter().position(|t| t.code == name) {
        return Some(TypeTarget { index, entry: None });
    }
    let url = fisher
        .fish_for_metadata(name, FishKind::STRUCTURES)
        .and_then(|md| md.url)
        .unwrap_or_else(|| name.to_string());
    types.iter().enumerate().find_map(|(index, t)| {
        t.profiles()
            .iter()
            .chain(t.target_profiles())
            .find(|p| **p == url)
            .map(|p| TypeTarget {
                index,
                entry: Some(p.clone()),
            })
    })
}

/// The types an `only` rule is matched against. A target filter leaves only the
/// named type, reduced to the named profile when it named one.
fn candidate_types(types: &[ElementDefinitionType], target: Option<&TypeTarget>) -> Vec<ElementDefinitionType> {
    let Some(target) = target else {
        return types.to_vec();
    };
    let mut candidate = types[target.index].clone();
    if let Some(entry) = &target.entry {
        if candidate.profiles().contains(entry) {
            candidate.profile = Some(vec![entry.clone()]);
        }
        if candidate.target_profiles().contains(entry) {
            candidate.target_profile = Some(vec![entry.clone()]);
        }
    }
    vec![candidate]
}

/// Match one alternative against `types`, walking its lineage from the most
/// specific definition outwards. `Ok(None)` when nothing matches.
fn match_rule_type(
    types: &[ElementDefinitionType],
    rule_type: &OnlyRuleType,
    lineage: &[Metadata],
    element: &str,
) -> Result<Option<TypeMatch>> {
    let Some(requested) = lineage.first() else {
        return Ok(None);
    };
    if rule_type.is_reference_like() {
        return Ok(match_reference(types, rule_type, lineage));
    }

    for (depth, md) in lineage.iter().enumerate() {
        let found = types.iter().position(|t| {
            (t.profiles().is_empty() && md.type_code() == Some(t.code.as_str()))
                || t.profiles().iter().any(|p| md.matches_canonical(p))
                || (md.is_logical() && t.code == md.id)
        });
        let Some(index) = found else {
            continue;
        };
        if depth > 0 && !md.is_abstract && !md.is_constraint() && requested.sd_type != md.sd_type {
            return Err(Error::NonAbstractParent {
                element: element.to_string(),
                type_name: rule_type.type_name.clone(),
                parent: md.name.clone(),
            });
        }

        let existing = &types[index];
        let mut new_type = existing.clone();
        if depth > 0 {
            if let Some(code) = requested.type_code() {
                new_type.code = code.to_string();
            }
        }
        new_type.profile = if requested.is_constraint() {
            requested.url.clone().map(|url| vec![url])
        } else {
            None
        };
        if new_type.code != existing.code {
            new_type.target_profile = None;
        }
        return Ok(Some(TypeMatch { index, new_type }));
    }
    Ok(None)
}

/// `Reference(X)`, `Canonical(X)` and `CodeableReference(X)` match the type with
/// that code whose target profiles allow X or one of its ancestors.
fn match_reference(
    types: &[ElementDefinitionType],
    rule_type: &OnlyRuleType,
    lineage: &[Metadata],
) -> Option<TypeMatch> {
    let requested_url = lineage.first().and_then(|md| md.url.clone())?;

    for code in reference_codes(rule_type) {
        let found = types.iter().position(|t| {
            t.code == *code
                && (t.target_profiles().is_empty()
                    || t.target_profiles()
                        .iter()
                        .any(|target| lineage.iter().any(|md| md.matches_canonical(target))))
        });
        if let Some(index) = found {
            let mut new_type = types[index].clone();
            new_type.target_profile = Some(vec![requested_url]);
            return Some(TypeMatch { index, new_type });
        }
    }
    None
}

fn reference_codes(rule_type: &OnlyRuleType) -> &'static [&'static str] {
    if rule_type.is_reference {
        &["Reference", "CodeableReference"]
    } else if rule_type.is_canonical {
        &["canonical"]
    } else {
        &["CodeableReference"]
    }
}

/// Types already narrower than an alternative: one of their profiles (target
/// profiles, for references) descends from it. They are kept, limited to the
/// descending entries.
fn match_narrower(
    types: &[ElementDefinitionType],
    rule_type: &OnlyRuleType,
    rule_lineage: &[Metadata],
    fisher: &dyn Fishable,
) -> Vec<TypeMatch> {
    let Some(requested) = rule_lineage.first().and_then(|md| md.url.as_deref()) else {
        return Vec::new();
    };
    let descends = |canonical: &str| {
        lineage(fisher, canonical, LineageOptions { include_imposed: true })
            .iter()
            .any(|md| md.matches_canonical(requested))
    };

    types
        .iter()
        .enumerate()
        .filter_map(|(index, t)| {
            let mut kept = t.clone();
            if rule_type.is_reference_like() {
                if !reference_codes(rule_type).contains(&t.code.as_str()) {
                    return None;
                }
                let targets: Vec<String> =
                    t.target_profiles().iter().filter(|p| descends(p.as_str())).cloned().collect();
                if targets.is_empty() {
                    return None;
                }
                kept.target_profile = Some(targets);
            } else {
                let profiles: Vec<String> =
                    t.profiles().iter().filter(|p| descends(p.as_str())).cloned().collect();
                if profiles.is_empty() {
                    return None;
                }
                kept.profile = Some(profiles);
            }
            Some(TypeMatch { index, new_type: kept })
        })
        .collect()
}

/// Build the new type list. Every current type is replaced by the types derived
/// from it, grouped by code; a type without profiles absorbs the profiled types
/// of the same code. Current types outside `candidates` are kept as they are.
fn assemble_types(
    current: &[ElementDefinitionType],
    candidates: &[ElementDefinitionType],
    matches: &[TypeMatch],
    target: Option<&TypeTarget>,
) -> Vec<ElementDefinitionType> {
    let mut narrowed: Vec<Vec<ElementDefinitionType>> = vec![Vec::new(); candidates.len()];
    for found in matches {
        let group = &mut narrowed[found.index];
        match group.iter_mut().find(|t| t.code == found.new_type.code) {
            Some(existing) => merge_restrictions(existing, &found.new_type),
            None => group.push(found.new_type.clone()),
        }
    }

    let Some(target) = target else {
        return narrowed.into_iter().flatten().collect();
    };

    let replacement: Vec<ElementDefinitionType> = match &target.entry {
        // Swap the named profile for its narrowed profiles and keep the others.
        Some(entry) => narrowed
            .into_iter()
            .flatten()
            .map(|new_type| {
                let mut merged = current[target.index].clone();
                merged.code = new_type.code.clone();
                merged.profile = splice(merged.profile.take(), entry, new_type.profiles());
                merged.target_profile = splice(merged.target_profile.take(), entry, new_type.target_profiles());
                merged
            })
            .collect(),
        None => narrowed.into_iter().flatten().collect(),
    };

    let mut result = Vec::with_capacity(current.len() + replacement.len());
    result.extend_from_slice(&current[..target.index]);
    result.extend(replacement);
    result.extend_from_slice(&current[target.index + 1..]);
    result
}

/// Combine two narrowings of the same code. No restriction wins over a list of them.
fn merge_restrictions(existing: &mut ElementDefinitionType, other: &ElementDefinitionType) {
    existing.profile = union(existing.profile.take(), other.profile.as_ref());
    existing.target_profile = union(existing.target_profile.take(), other.target_profile.as_ref());
}

fn union(current: Option<Vec<String>>, other: Option<&Vec<String>>) -> Option<Vec<String>> {
    let (mut current, other) = (current?, other?);
    for entry in other {
        if !current.contains(entry) {
            current.push(entry.clone());
        }
    }
    Some(current)
}

fn splice(list: Option<Vec<String>>, entry: &str, replacement: &[String]) -> Option<Vec<String>> {
    let list = list?;
    let Some(position) = list.iter().position(|p| p == entry) else {
        return Some(list);
    };
    let mut spliced = list[..position].to_vec();
    for item in replacement {
        if !spliced.contains(item) && !list[position + 1..].contains(item) {
            spliced.push(item.clone());
        }
    }
    spliced.extend_from_slice(&list[position + 1..]);
    (!spliced.is_empty()).then_some(spliced)
}

fn type_list(types: &[ElementDefinitionType]) -> String {
    types
        .iter()
        .map(|t| t.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsh_context::testing::{core_index, core_url, example_url};
    use fsh_models::{DiscriminatorType, ElementDefinitionDiscriminator, SlicingRules};
    use pretty_assertions::assert_eq;

    fn profile(base: &str) -> StructureDefinition {
        let index = core_index();
        StructureDefinition::fish(&index, base)
            .unwrap()
            .derive_profile("p", "P", &example_url("p"))
    }

    fn types_of(sd: &StructureDefinition, id: &str) -> Vec<ElementDefinitionType> {
        sd.find_element(id).unwrap().types().to_vec()
    }

    #[test]
    fn restricts_choice_to_one_type() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();

        sd.constrain_type(
            "Observation.value[x]",
            &[OnlyRuleType::new("string")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(types_of(&sd, "Observation.value[x]"), vec![ElementDefinitionType::new("string")]);
        let diff = sd.differential();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].types, Some(vec![ElementDefinitionType::new("string")]));
    }

    #[test]
    fn profiles_are_added_for_constraints() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();

        sd.constrain_type(
            "Observation.value[x]",
            &[OnlyRuleType::new("SimpleQuantity"), OnlyRuleType::new("CodeableConcept")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.value[x]"),
            vec![
                ElementDefinitionType::new("Quantity").with_profiles(vec![core_url("SimpleQuantity")]),
                ElementDefinitionType::new("CodeableConcept"),
            ]
        );
    }

    #[test]
    fn unprofiled_type_absorbs_profiles_of_same_code() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();

        sd.constrain_type(
            "Observation.value[x]",
            &[OnlyRuleType::new("Quantity"), OnlyRuleType::new("SimpleQuantity")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(types_of(&sd, "Observation.value[x]"), vec![ElementDefinitionType::new("Quantity")]);
    }

    #[test]
    fn narrows_reference_targets() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();

        sd.constrain_type(
            "Observation.subject",
            &[OnlyRuleType::reference("MyPatient"), OnlyRuleType::reference("Group")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.subject"),
            vec![ElementDefinitionType::new("Reference")
                .with_target_profiles(vec![example_url("my-patient"), core_url("Group")])]
        );

        let err = sd
            .constrain_type(
                "Observation.subject",
                &[OnlyRuleType::reference("Practitioner")],
                None,
                &index,
                &mut diagnostics,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidType { .. }));
    }

    #[test]
    fn reference_rule_falls_back_to_codeable_reference() {
        let index = core_index();
        let mut sd = profile("Procedure");
        let mut diagnostics = Diagnostics::new();
        sd.constrain_type(
            "Procedure.reason",
            &[OnlyRuleType::reference("Condition")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Procedure.reason"),
            vec![ElementDefinitionType::new("CodeableReference").with_target_profiles(vec![core_url("Condition")])]
        );
    }

    #[test]
    fn resource_element_takes_subtype_code() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sd.constrain_type(
            "Observation.contained",
            &[OnlyRuleType::new("MyPatient")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.contained"),
            vec![ElementDefinitionType::new("Patient").with_profiles(vec![example_url("my-patient")])]
        );
    }

    #[test]
    fn rejects_unknown_mismatched_and_specialized_types() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();

        let err = sd
            .constrain_type("Observation.value[x]", &[OnlyRuleType::new("Nope")], None, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::TypeNotFound { .. }));

        let err = sd
            .constrain_type("Observation.value[x]", &[OnlyRuleType::new("Coding")], None, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidType { .. }));

        let err = sd
            .constrain_type(
                "Observation.value[x]",
                &[OnlyRuleType::new("SpecialQuantity")],
                None,
                &index,
                &mut diagnostics,
            )
            .unwrap_err();
        assert!(matches!(err, Error::NonAbstractParent { .. }));
        assert_eq!(types_of(&sd, "Observation.value[x]").len(), 9);
    }

    #[test]
    fn target_filter_narrows_one_type_in_place() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sd.constrain_type(
            "Observation.value[x]",
            &[OnlyRuleType::new("SimpleQuantity")],
            Some("Quantity"),
            &index,
            &mut diagnostics,
        )
        .unwrap();
        let types = types_of(&sd, "Observation.value[x]");
        assert_eq!(types.len(), 9);
        assert_eq!(
            types[0],
            ElementDefinitionType::new("Quantity").with_profiles(vec![core_url("SimpleQuantity")])
        );
        assert_eq!(types[1], ElementDefinitionType::new("CodeableConcept"));
    }

    #[test]
    fn connected_elements_keep_common_types() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sd.slice_it(
            "Observation.component",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Pattern,
                path: "code".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        let slice = sd.add_slice("Observation.component", "s", None).unwrap();
        sd.unfold(&slice, &index, &mut diagnostics).unwrap();

        sd.constrain_type(
            "Observation.component:s.value[x]",
            &[OnlyRuleType::new("Quantity")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();

        let err = sd
            .constrain_type(
                "Observation.component.value[x]",
                &[OnlyRuleType::new("string")],
                None,
                &index,
                &mut diagnostics,
            )
            .unwrap_err();
        assert!(matches!(err, Error::EmptyConnectedTypes { .. }));
        assert_eq!(types_of(&sd, "Observation.component.value[x]").len(), 3);

        sd.constrain_type(
            "Observation.component.value[x]",
            &[OnlyRuleType::new("Quantity"), OnlyRuleType::new("string")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.component:s.value[x]"),
            vec![ElementDefinitionType::new("Quantity")]
        );
    }

    fn sliced_component(sd: &mut StructureDefinition, diagnostics: &mut Diagnostics) -> String {
        let index = core_index();
        sd.slice_it(
            "Observation.component",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Pattern,
                path: "code".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        let slice = sd.add_slice("Observation.component", "s", None).unwrap();
        sd.unfold(&slice, &index, diagnostics).unwrap();
        slice
    }

    #[test]
    fn connected_profiles_under_the_new_type_are_kept() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sliced_component(&mut sd, &mut diagnostics);
        sd.constrain_type(
            "Observation.component:s.value[x]",
            &[OnlyRuleType::new("SimpleQuantity")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();

        sd.constrain_type(
            "Observation.component.value[x]",
            &[OnlyRuleType::new("Quantity"), OnlyRuleType::new("string")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.component.value[x]"),
            vec![ElementDefinitionType::new("Quantity"), ElementDefinitionType::new("string")]
        );
        assert_eq!(
            types_of(&sd, "Observation.component:s.value[x]"),
            vec![ElementDefinitionType::new("Quantity").with_profiles(vec![core_url("SimpleQuantity")])]
        );
    }

    #[test]
    fn connected_reference_targets_under_the_new_target_are_kept() {
        let index = core_index();
        let mut sd = profile("Patient");
        let mut diagnostics = Diagnostics::new();
        sd.slice_it(
            "Patient.link",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Value,
                path: "type".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        let slice = sd.add_slice("Patient.link", "mine", None).unwrap();
        sd.unfold(&slice, &index, &mut diagnostics).unwrap();
        sd.constrain_type(
            "Patient.link:mine.other",
            &[OnlyRuleType::reference("MyPatient")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();

        sd.constrain_type(
            "Patient.link.other",
            &[OnlyRuleType::reference("Patient")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Patient.link.other"),
            vec![ElementDefinitionType::new("Reference").with_target_profiles(vec![core_url("Patient")])]
        );
        assert_eq!(
            types_of(&sd, "Patient.link:mine.other"),
            vec![ElementDefinitionType::new("Reference").with_target_profiles(vec![example_url("my-patient")])]
        );
    }

    #[test]
    fn removing_the_type_of_a_choice_slice_warns() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        let slice = sd
            .find_element_by_path("valueQuantity", &index, &mut diagnostics)
            .unwrap();
        assert_eq!(slice, "Observation.value[x]:valueQuantity");

        sd.constrain_type(
            "Observation.value[x]",
            &[OnlyRuleType::new("string")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(types_of(&sd, "Observation.value[x]"), vec![ElementDefinitionType::new("string")]);
        assert!(diagnostics
            .warnings()
            .any(|w| w.element.as_deref() == Some(slice.as_str())));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn prohibited_connected_element_may_lose_all_types() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sliced_component(&mut sd, &mut diagnostics);
        sd.constrain_type(
            "Observation.component:s.value[x]",
            &[OnlyRuleType::new("Quantity")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        sd.constrain_cardinality(
            "Observation.component:s.value[x]",
            None,
            Some(Max::Bounded(0)),
            &mut diagnostics,
        )
        .unwrap();

        sd.constrain_type(
            "Observation.component.value[x]",
            &[OnlyRuleType::new("string")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(
            types_of(&sd, "Observation.component.value[x]"),
            vec![ElementDefinitionType::new("string")]
        );
        assert_eq!(
            types_of(&sd, "Observation.component:s.value[x]"),
            vec![ElementDefinitionType::new("Quantity")]
        );
        assert!(diagnostics
            .warnings()
            .any(|w| w.element.as_deref() == Some("Observation.component:s.value[x]")));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn rejected_narrowing_leaves_no_diagnostics() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sliced_component(&mut sd, &mut diagnostics);
        sd.constrain_type(
            "Observation.component:s.value[x]",
            &[OnlyRuleType::new("Quantity")],
            None,
            &index,
            &mut diagnostics,
        )
        .unwrap();
        // Its removal would be warned about before the slice s fails the rule.
        sd.find_element_by_path("component.valueQuantity", &index, &mut diagnostics)
            .unwrap();
        let before = diagnostics.len();

        let err = sd
            .constrain_type(
                "Observation.component.value[x]",
                &[OnlyRuleType::new("string")],
                None,
                &index,
                &mut diagnostics,
            )
            .unwrap_err();
        assert!(matches!(err, Error::EmptyConnectedTypes { .. }));
        assert_eq!(diagnostics.len(), before);
    }

    #[test]
    fn misplaced_modifier_extension_is_reported() {
        let index = core_index();
        let mut sd = profile("Observation");
        let mut diagnostics = Diagnostics::new();
        sd.slice_it(
            "Observation.extension",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Value,
                path: "url".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        let slice = sd.add_slice("Observation.extension", "mod", None).unwrap();
        sd.constrain_type(&slice, &[OnlyRuleType::new("MyModifierExtension")], None, &index, &mut diagnostics)
            .unwrap();
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(
            types_of(&sd, &slice),
            vec![ElementDefinitionType::new("Extension").with_profiles(vec![example_url("my-modifier-extension")])]
        );
    }
}
