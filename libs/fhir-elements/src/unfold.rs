//! Unfolding
//!
//! A snapshot lists the children of an element only where its parent definition
//! did. Before a rule can reach `Observation.code.coding`, the children of
//! `Observation.code` are copied in from the definition of `CodeableConcept`.
//! Slices copy the children of the element they slice, and elements with a
//! `contentReference` copy the children of the referenced element.

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::structure::StructureDefinition;
use crate::tree::sliced_element_id;
use fsh_context::{FishKind, Fishable};
use fsh_models::ElementDefinition;

impl StructureDefinition {
    /// Materialize the children of `id`. Returns the ids of the new elements;
    /// nothing is added when the element already has children or its type is
    /// ambiguous.
    pub fn unfold(
        &mut self,
        id: &str,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<String>> {
        if !self.elements().children(id, true).is_empty() {
            return Ok(Vec::new());
        }
        let element = self.element(id)?.clone();

        let grafted = if let Some(reference) = &element.content_reference {
            self.referenced_children(&element, reference)?
        } else {
            let mut from_slice = Vec::new();
            if element.slice_name.is_some() && !has_single_profile(&element) {
                from_slice = self.sliced_children(&element, fisher, diagnostics)?;
            }
            if from_slice.is_empty() {
                match self.type_children(&element, fisher, diagnostics)? {
                    Some(children) => children,
                    None => return Ok(Vec::new()),
                }
            } else {
                from_slice
            }
        };

        if grafted.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(element = id, count = grafted.len(), "Unfolded element");
        self.graft_after(id, grafted)
    }

    /// Children of the element a `contentReference` points to, re-rooted on
    /// `element`. Baselines are copied so inherited constraints stay out of the
    /// differential.
    fn referenced_children(
        &self,
        element: &ElementDefinition,
        reference: &str,
    ) -> Result<Vec<ElementDefinition>> {
        let target_id = reference
            .rsplit_once('#')
            .map_or(reference, |(_, fragment)| fragment);
        let target = self.element(target_id)?;
        let target_path = target.path.clone();

        let children = self
            .elements()
            .descendants(target_id)
            .iter()
            .filter_map(|child_id| self.elements().node(child_id))
            .map(|node| {
                let source = node.baseline().unwrap_or(node.element());
                let mut child = source.clone();
                child.id = format!("{}{}", element.id, &node.id()[target_id.len()..]);
                child.path = format!("{}{}", element.path, &source.path[target_path.len().min(source.path.len())..]);
                child
            })
            .collect();
        Ok(children)
    }

    /// Children of the sliced element, re-rooted on the slice.
    fn sliced_children(
        &mut self,
        element: &ElementDefinition,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ElementDefinition>> {
        let Some(sliced_id) = sliced_element_id(&element.id).map(str::to_string) else {
            return Ok(Vec::new());
        };
        if self.elements().children(&sliced_id, true).is_empty() {
            self.unfold(&sliced_id, fisher, diagnostics)?;
        }

        let children = self
            .elements()
            .descendants(&sliced_id)
            .iter()
            .filter_map(|child_id| self.find_element(child_id))
            .map(|source| {
                let mut child = source.clone();
                child.id = format!("{}{}", element.id, &source.id[sliced_id.len()..]);
                child
            })
            .collect();
        Ok(children)
    }

    /// Children from the definition of the element's single type or profile.
    /// `None` when the element has no single type or the type cannot be found.
    fn type_children(
        &self,
        element: &ElementDefinition,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Vec<ElementDefinition>>> {
        let [element_type] = element.types() else {
            return Ok(None);
        };
        let profiles = element_type.profiles();
        if profiles.len() > 1 {
            return Ok(None);
        }

        let mut definition = None;
        if let Some(profile) = profiles.first() {
            definition = fisher.fish_for_structure(profile, FishKind::STRUCTURES);
            if definition.is_none() {
                diagnostics.warn(
                    &element.id,
                    format!(
                        "Cannot find profile {}, unfolding {} from its base type {}",
                        profile, element.id, element_type.code
                    ),
                );
            }
        }
        let definition = match definition
            .or_else(|| fisher.fish_for_structure(&element_type.code, FishKind::STRUCTURES))
        {
            Some(definition) => definition,
            None => {
                diagnostics.debug(
                    &element.id,
                    format!("Cannot find type {}, {} has no children to unfold", element_type.code, element.id),
                );
                return Ok(None);
            }
        };

        let snapshot = definition.snapshot.map(|s| s.element).unwrap_or_default();
        let Some((root, rest)) = snapshot.split_first() else {
            return Ok(Some(Vec::new()));
        };
        let children = rest
            .iter()
            .filter(|child| child.id.starts_with(&format!("{}.", root.id)))
            .map(|source| {
                let mut child = source.clone();
                child.id = format!("{}{}", element.id, &source.id[root.id.len()..]);
                child.path = format!("{}{}", element.path, &source.path[root.path.len().min(source.path.len())..]);
                child
            })
            .collect();
        Ok(Some(children))
    }
}

/// A slice typed with exactly one profile unfolds from that profile, not from
/// the sliced element.
fn has_single_profile(element: &ElementDefinition) -> bool {
    matches!(element.types(), [t] if t.profiles().len() == 1)
}
