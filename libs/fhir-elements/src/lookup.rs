//! Element lookup by FSH path
//!
//! Rules address elements by FSH path (`component[systolic].value[x]`), not by
//! id. Resolving a path walks it one part at a time from the root, unfolding
//! elements whose children are not in the snapshot yet. A choice element can be
//! named by one of its types (`valueQuantity`); on a multi-type choice this
//! creates the type slice `value[x]:valueQuantity` on first use.

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::path::{parse_path, PathPart};
use crate::structure::StructureDefinition;
use crate::tree::{is_slice_id, last_segment};
use fsh_context::{FishKind, Fishable};
use fsh_models::{DiscriminatorType, ElementDefinitionDiscriminator, SlicingRules};

impl StructureDefinition {
    /// Resolve `path` to an element id. The empty path is the root element.
    pub fn find_element_by_path(
        &mut self,
        path: &str,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<String> {
        let parts = parse_path(path)?;
        let mut current = self.root_id().to_string();
        if current.is_empty() {
            return Err(self.not_found(path));
        }
        for part in &parts {
            current = self
                .resolve_part(&current, part, fisher, diagnostics)?
                .ok_or_else(|| self.not_found(path))?;
        }
        Ok(current)
    }

    fn resolve_part(
        &mut self,
        parent: &str,
        part: &PathPart,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<String>> {
        let mut children = self.unsliced_children(parent);
        if children.is_empty() {
            self.unfold(parent, fisher, diagnostics)?;
            children = self.unsliced_children(parent);
        }

        let choice_name = format!("{}[x]", part.base);
        let mut found = children
            .iter()
            .find(|child| {
                let name = last_segment(child);
                name == part.base || name == choice_name
            })
            .cloned();
        if found.is_none() {
            found = self.choice_by_type(&children, &part.base)?;
        }
        let Some(mut element_id) = found else {
            return Ok(None);
        };

        for slice_name in part.slice_names() {
            match self.find_slice(&element_id, slice_name, fisher) {
                Some(slice_id) => element_id = slice_id,
                None => return Ok(None),
            }
        }
        Ok(Some(element_id))
    }

    fn unsliced_children(&self, id: &str) -> Vec<String> {
        self.elements()
            .children(id, true)
            .into_iter()
            .filter(|child| !is_slice_id(child))
            .collect()
    }

    /// `valueQuantity` names the Quantity type of `value[x]`: the choice itself
    /// when Quantity is its only type, otherwise its Quantity type slice.
    fn choice_by_type(&mut self, children: &[String], name: &str) -> Result<Option<String>> {
        for child in children {
            let Some(prefix) = last_segment(child).strip_suffix("[x]") else {
                continue;
            };
            let Some(type_name) = name.strip_prefix(prefix) else {
                continue;
            };
            let element = self.element(child)?;
            let Some(element_type) = element
                .types()
                .iter()
                .find(|t| upper_first(&t.code) == type_name)
                .cloned()
            else {
                continue;
            };
            if element.types().len() == 1 {
                return Ok(Some(child.clone()));
            }

            let slice_id = format!("{}:{}", child, name);
            if self.elements().contains(&slice_id) {
                return Ok(Some(slice_id));
            }
            if element.slicing.is_none() {
                self.slice_it(
                    child,
                    ElementDefinitionDiscriminator {
                        discriminator_type: DiscriminatorType::Type,
                        path: "$this".into(),
                    },
                    false,
                    SlicingRules::Open,
                )?;
            }
            return self.add_slice(child, name, Some(element_type)).map(Some);
        }
        Ok(None)
    }

    /// A slice (or reslice) of `id` by name. On extension elements the name may
    /// also be the name, id or URL of the extension a slice is typed with.
    fn find_slice(&self, id: &str, name: &str, fisher: &dyn Fishable) -> Option<String> {
        let separator = if is_slice_id(id) { '/' } else { ':' };
        let slice_id = format!("{}{}{}", id, separator, name);
        if self.elements().contains(&slice_id) {
            return Some(slice_id);
        }

        let element_name = last_segment(id).split(':').next().unwrap_or_default();
        if !matches!(element_name, "extension" | "modifierExtension") {
            return None;
        }
        let url = fisher
            .fish_for_metadata(name, &[FishKind::Extension])
            .and_then(|md| md.url);
        self.elements().direct_slices(id).into_iter().find(|slice| {
            self.find_element(slice).is_some_and(|element| {
                element.types().iter().any(|t| {
                    t.profiles()
                        .iter()
                        .any(|p| p == name || Some(p) == url.as_ref())
                })
            })
        })
    }
}

fn upper_first(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
