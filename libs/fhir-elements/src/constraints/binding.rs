use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::structure::StructureDefinition;
use fsh_context::{is_descendant_of, FishKind, Fishable};
use fsh_models::{BindingStrength, ElementDefinitionBinding};
use serde_json::Map;

/// Types that can carry a value set binding, directly or through a subtype.
const BINDABLE_TYPES: &[&str] = &[
    "code",
    "Coding",
    "CodeableConcept",
    "CodeableReference",
    "Quantity",
    "string",
    "uri",
];

impl StructureDefinition {
    /// Bind an element to a value set, given by name, id or URL.
    ///
    /// The binding of connected elements that shared the old value set follows
    /// along. A slice that is already bound more strictly keeps its binding.
    pub fn bind_to_value_set(
        &mut self,
        id: &str,
        value_set: &str,
        strength: BindingStrength,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let url = resolve_value_set(value_set, fisher)?;
        self.transaction(diagnostics, |sd, diagnostics| {
            let old_value_set = sd.element(id)?.binding.as_ref().and_then(|b| b.value_set.clone());
            sd.bind_element(id, &url, strength, fisher)?;

            for connected_id in sd.elements().connected_elements(id) {
                let connected_value_set = sd
                    .find_element(&connected_id)
                    .and_then(|e| e.binding.as_ref())
                    .and_then(|b| b.value_set.clone());
                if connected_value_set != old_value_set {
                    continue;
                }
                match sd.bind_element(&connected_id, &url, strength, fisher) {
                    Ok(()) => {}
                    // A slice may stay bound more strictly than its list.
                    Err(e @ Error::BindingStrengthDecrease { .. }) => diagnostics.debug(
                        &connected_id,
                        format!("Kept the binding of {}: {}", connected_id, e),
                    ),
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
    }

    fn bind_element(
        &mut self,
        id: &str,
        url: &str,
        strength: BindingStrength,
        fisher: &dyn Fishable,
    ) -> Result<()> {
        let element = self.element(id)?;
        if !element.types().iter().any(|t| is_bindable(&t.code, fisher)) {
            return Err(Error::UnbindableType {
                element: id.to_string(),
                types: element.type_codes().join(", "),
            });
        }
        if let Some(current) = element.binding.as_ref().map(|b| b.strength) {
            if current > strength {
                return Err(Error::BindingStrengthDecrease {
                    element: id.to_string(),
                    current,
                    requested: strength,
                });
            }
        }

        let element = self.element_mut(id)?;
        match element.binding.as_mut() {
            Some(binding) => {
                binding.strength = strength;
                binding.value_set = Some(url.to_string());
            }
            None => {
                element.binding = Some(ElementDefinitionBinding {
                    strength,
                    description: None,
                    value_set: Some(url.to_string()),
                    other: Map::new(),
                })
            }
        }
        Ok(())
    }
}

/// The canonical URL of a value set. Value sets that are not loaded are used
/// as written and must be valid URIs; a `|version` suffix is kept.
fn resolve_value_set(value_set: &str, fisher: &dyn Fishable) -> Result<String> {
    let version = value_set.split_once('|').map(|(_, version)| version);
    let url = match fisher
        .fish_for_metadata(value_set, &[FishKind::ValueSet])
        .and_then(|md| md.url)
    {
        Some(url) => match version {
            Some(version) => format!("{}|{}", url, version),
            None => url,
        },
        None => value_set.to_string(),
    };

    let unversioned = url.split('|').next().unwrap_or_default();
    if url::Url::parse(unversioned).is_err() {
        return Err(Error::InvalidUri {
            value_set: value_set.to_string(),
        });
    }
    Ok(url)
}

fn is_bindable(code: &str, fisher: &dyn Fishable) -> bool {
    if BINDABLE_TYPES.contains(&code) {
        return true;
    }
    if BINDABLE_TYPES
        .iter()
        .any(|bindable| is_descendant_of(fisher, code, bindable))
    {
        return true;
    }
    fisher
        .fish_for_metadata(code, &[FishKind::Logical])
        .is_some_and(|md| md.can_bind)
}
