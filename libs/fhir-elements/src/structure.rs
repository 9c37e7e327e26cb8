//! StructureDefinition being constrained
//!
//! Owns the element tree of one artifact together with its StructureDefinition
//! level properties. A profile starts as a copy of its parent: every inherited
//! element captures its baseline at that moment, so the differential only shows
//! what rules change afterwards.

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::path::{parse_path, PathPart};
use crate::tree::{ElementNode, ElementTree};
use crate::value::{decimal_to_json, FshValue};
use fsh_context::{FishKind, Fishable};
use fsh_models::{
    split_choice_property, DataType, Differential, ElementDefinition, Snapshot,
    StructureDefinition as StructureDefinitionModel, StructureDefinitionKind, TypeDerivationRule,
};
use phf::{phf_map, phf_set};
use serde_json::{json, Map, Value};

/// StructureDefinition-level properties a derived profile keeps from its parent.
const INHERITED_PROPERTIES: &[&str] = &["mapping"];

/// Properties whose JSON value is a list even when a caret path gives no index.
static ARRAY_PROPERTIES: phf::Set<&'static str> = phf_set! {
    "extension", "modifierExtension", "representation", "code", "alias", "type",
    "profile", "targetProfile", "aggregation", "example", "condition", "constraint",
    "mapping", "discriminator", "coding", "given", "prefix", "suffix", "line",
    "contact", "telecom", "jurisdiction", "useContext", "keyword", "context",
    "contextInvariant", "identifier", "additional",
};

/// Caret paths (brackets removed) whose coded values are Codings or CodeableConcepts.
static CODED_PROPERTIES: phf::Map<&'static str, DataType> = phf_map! {
    "code" => DataType::Coding,
    "keyword" => DataType::Coding,
    "jurisdiction" => DataType::CodeableConcept,
    "useContext.code" => DataType::Coding,
};

#[derive(Debug, Clone)]
pub struct StructureDefinition {
    /// StructureDefinition-level properties; `snapshot` and `differential` are
    /// always `None` here and rebuilt from the tree on export.
    header: StructureDefinitionModel,
    elements: ElementTree,
}

impl StructureDefinition {
    pub fn from_model(mut model: StructureDefinitionModel) -> Result<Self> {
        let snapshot = model.snapshot.take().ok_or_else(|| {
            Error::InvalidStructureDefinition(format!("{} has no snapshot", model.url))
        })?;
        model.differential = None;
        let elements = ElementTree::from_elements(snapshot.element)?;
        if elements.is_empty() {
            return Err(Error::InvalidStructureDefinition(format!(
                "{} has an empty snapshot",
                model.url
            )));
        }
        Ok(Self {
            header: model,
            elements,
        })
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        Self::from_model(StructureDefinitionModel::from_value(value)?)
    }

    /// Load a definition by name, id or URL.
    pub fn fish(fisher: &dyn Fishable, item: &str) -> Result<Self> {
        let model = fisher
            .fish_for_structure(item, FishKind::STRUCTURES)
            .ok_or_else(|| Error::DefinitionNotFound {
                item: item.to_string(),
            })?;
        Self::from_model(model)
    }

    /// Start a profile of this definition.
    pub fn derive_profile(&self, id: &str, name: &str, url: &str) -> Self {
        let mut profile = self.clone();
        profile.header = self.derived_header(id, name, url);
        profile.header.derivation = Some(TypeDerivationRule::Constraint);
        profile.elements.capture_baselines();
        tracing::debug!(parent = %self.header.url, profile = url, "Derived profile");
        profile
    }

    /// Start a new type (logical model or resource) based on this definition.
    ///
    /// Element ids and paths are re-rooted on `name`. Logical models use their
    /// URL as type.
    pub fn derive_specialization(
        &self,
        id: &str,
        name: &str,
        url: &str,
        kind: StructureDefinitionKind,
    ) -> Result<Self> {
        let mut header = self.derived_header(id, name, url);
        header.derivation = Some(TypeDerivationRule::Specialization);
        header.kind = kind;
        header.type_ = match kind {
            StructureDefinitionKind::Logical => url.to_string(),
            _ => name.to_string(),
        };

        let old_root = self.root_id().to_string();
        let elements = self
            .elements
            .elements()
            .map(|element| {
                let mut renamed = element.clone();
                renamed.id = reroot(&element.id, &old_root, name);
                renamed.path = reroot(&element.path, &old_root, name);
                renamed
            })
            .collect();
        let mut tree = ElementTree::from_elements(elements)?;
        if let Some(root) = tree.node_mut(name) {
            root.clear_baseline();
        }
        Ok(Self {
            header,
            elements: tree,
        })
    }

    fn derived_header(&self, id: &str, name: &str, url: &str) -> StructureDefinitionModel {
        let mut header = self.header.clone();
        header.id = Some(id.to_string());
        header.name = name.to_string();
        header.url = url.to_string();
        header.version = None;
        header.title = None;
        header.description = None;
        header.status = "draft".to_string();
        header.extension = None;
        header.base_definition = Some(self.header.url.clone());
        header.is_abstract = false;
        header
            .extensions
            .retain(|key, _| INHERITED_PROPERTIES.contains(&key.as_str()));
        header
    }

    pub fn header(&self) -> &StructureDefinitionModel {
        &self.header
    }

    pub fn url(&self) -> &str {
        &self.header.url
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn sd_type(&self) -> &str {
        &self.header.type_
    }

    /// True for resources, data types and logical models; false for profiles.
    pub fn is_specialization(&self) -> bool {
        self.header.is_specialization()
    }

    pub fn elements(&self) -> &ElementTree {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut ElementTree {
        &mut self.elements
    }

    pub fn root_id(&self) -> &str {
        self.elements.root().map_or("", |root| root.id.as_str())
    }

    /// Look up an element by id.
    pub fn find_element(&self, id: &str) -> Option<&ElementDefinition> {
        self.elements.get(id)
    }

    /// Look up an element by id, failing with `ElementNotFound`.
    pub fn element(&self, id: &str) -> Result<&ElementDefinition> {
        self.elements.get(id).ok_or_else(|| self.not_found(id))
    }

    pub(crate) fn element_mut(&mut self, id: &str) -> Result<&mut ElementDefinition> {
        let structure = self.header.name.clone();
        self.elements.get_mut(id).ok_or_else(|| Error::ElementNotFound {
            structure,
            path: id.to_string(),
        })
    }

    pub(crate) fn not_found(&self, path: &str) -> Error {
        Error::ElementNotFound {
            structure: self.header.name.clone(),
            path: path.to_string(),
        }
    }

    /// Run `operation` and restore every element if it fails, so a rejected
    /// constraint leaves no partial change behind. Diagnostics recorded by a
    /// failed operation are dropped with its changes.
    pub fn transaction<T>(
        &mut self,
        diagnostics: &mut Diagnostics,
        operation: impl FnOnce(&mut Self, &mut Diagnostics) -> Result<T>,
    ) -> Result<T> {
        let saved = self.elements.clone();
        let mut buffer = diagnostics.buffer();
        let result = operation(self, &mut buffer);
        match &result {
            Ok(_) => diagnostics.commit(buffer),
            Err(e) => {
                tracing::debug!(error = %e, dropped = buffer.len(), "Rolled back failed operation");
                self.elements = saved;
            }
        }
        result
    }

    /// Differential elements in document order.
    pub fn differential(&self) -> Vec<ElementDefinition> {
        self.elements.differential()
    }

    pub fn to_model(&self) -> StructureDefinitionModel {
        let mut model = self.header.clone();
        model.snapshot = Some(Snapshot {
            element: self.elements.elements().cloned().collect(),
        });
        model.differential = Some(Differential {
            element: self.differential(),
        });
        model
    }

    /// Full StructureDefinition JSON with snapshot and differential.
    pub fn to_resource(&self) -> Result<Value> {
        Ok(self.to_model().to_value()?)
    }

    /// Set a property by caret path on an element, or on the StructureDefinition
    /// itself when `element_id` is `None`.
    pub fn set_caret_value(
        &mut self,
        element_id: Option<&str>,
        caret_path: &str,
        value: &FshValue,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let target = element_id.unwrap_or(&self.header.name).to_string();
        let invalid = |reason: String| Error::InvalidCaretValue {
            target: target.clone(),
            caret_path: caret_path.to_string(),
            reason,
        };

        let parts = parse_path(caret_path)?;
        if parts.is_empty() {
            return Err(invalid("empty caret path".into()));
        }
        let json_value = caret_json(&parts, value, fisher)?;

        match element_id {
            Some(id) => {
                let element = self.element(id)?;
                let mut json = element.to_json();
                set_json_path(&mut json, &parts, json_value).map_err(invalid)?;
                let updated = ElementDefinition::from_json(&json)?;
                if updated.id != element.id || updated.path != element.path {
                    return Err(invalid("the id and path of an element cannot be changed".into()));
                }
                *self.element_mut(id)? = updated;
            }
            None => {
                if matches!(parts[0].base.as_str(), "snapshot" | "differential" | "resourceType") {
                    return Err(invalid(format!("{} cannot be set by a caret rule", parts[0].base)));
                }
                let mut json = self.header.to_value()?;
                set_json_path(&mut json, &parts, json_value).map_err(invalid)?;
                let mut header = StructureDefinitionModel::from_value(&json)?;
                header.snapshot = None;
                header.differential = None;
                self.header = header;
            }
        }
        diagnostics.debug(&target, format!("Set ^{} = {}", caret_path, value));
        Ok(())
    }

    /// Insert grafted elements right after `id`, capturing their baselines.
    pub(crate) fn graft_after(&mut self, id: &str, elements: Vec<ElementDefinition>) -> Result<Vec<String>> {
        let position = self
            .elements
            .position(id)
            .ok_or_else(|| self.not_found(id))?;
        let ids = elements.iter().map(|e| e.id.clone()).collect();
        let nodes = elements.into_iter().map(ElementNode::with_baseline).collect();
        self.elements.insert_at(position + 1, nodes)?;
        Ok(ids)
    }
}

fn reroot(text: &str, old_root: &str, new_root: &str) -> String {
    match text.strip_prefix(old_root) {
        Some(rest) if rest.is_empty() || rest.starts_with('.') || rest.starts_with(':') => {
            format!("{}{}", new_root, rest)
        }
        _ => text.to_string(),
    }
}

/// JSON for a caret value. Coded values become Codings or CodeableConcepts where
/// the target property has that type, and plain codes otherwise.
fn caret_json(parts: &[PathPart], value: &FshValue, fisher: &dyn Fishable) -> Result<Value> {
    let json = match value {
        FshValue::Boolean(b) => json!(b),
        FshValue::Number(n) => decimal_to_json(*n),
        FshValue::String(s) => json!(s),
        FshValue::Code(code) => {
            let key = parts
                .iter()
                .map(|p| p.base.as_str())
                .collect::<Vec<_>>()
                .join(".");
            let last = parts.last().map_or("", |p| p.base.as_str());
            let data_type = CODED_PROPERTIES.get(key.as_str()).copied().or_else(|| {
                ["value", "fixed", "pattern", "defaultValue"]
                    .iter()
                    .find_map(|prefix| split_choice_property(last, prefix))
            });
            match data_type {
                Some(DataType::Coding) => code.to_coding(),
                Some(DataType::CodeableConcept) => code.to_codeable_concept(),
                _ => json!(code.code),
            }
        }
        FshValue::Quantity(q) => q.to_json(),
        FshValue::Ratio(r) => json!({
            "numerator": r.numerator.to_json(),
            "denominator": r.denominator.to_json(),
        }),
        FshValue::Reference(r) => r.to_json(),
        FshValue::Canonical(c) => json!(c.resolve(fisher)),
        FshValue::Instance(name) => crate::value::instance_json(fisher, name)?,
    };
    Ok(json)
}

/// Set `value` at `parts` below `root`, creating intermediate objects and lists.
fn set_json_path(root: &mut Value, parts: &[PathPart], value: Value) -> std::result::Result<(), String> {
    let Value::Object(map) = root else {
        return Err("target is not an object".into());
    };
    set_in_object(map, parts, value)
}

fn set_in_object(
    map: &mut Map<String, Value>,
    parts: &[PathPart],
    value: Value,
) -> std::result::Result<(), String> {
    let Some((part, rest)) = parts.split_first() else {
        return Err("empty path".into());
    };
    if let Some(name) = part.slice_names().first() {
        return Err(format!("slice name '{}' cannot be used in a caret path", name));
    }

    let index = part.index();
    let is_list = match map.get(&part.base) {
        Some(Value::Array(_)) => true,
        Some(Value::Null) | None => index.is_some() || ARRAY_PROPERTIES.contains(part.base.as_str()),
        Some(_) => false,
    };

    let slot = if is_list {
        let index = index.unwrap_or(0) as usize;
        let entry = map
            .entry(part.base.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if entry.is_null() {
            *entry = Value::Array(Vec::new());
        }
        let Value::Array(items) = entry else {
            return Err(format!("{} is not a list", part.base));
        };
        if index > items.len() {
            return Err(format!(
                "index {} of {} skips over missing entries",
                index, part.base
            ));
        }
        if index == items.len() {
            items.push(Value::Null);
        }
        &mut items[index]
    } else {
        if index.is_some_and(|i| i > 0) {
            return Err(format!("{} is not a list", part.base));
        }
        map.entry(part.base.clone()).or_insert(Value::Null)
    };

    if rest.is_empty() {
        *slot = value;
        return Ok(());
    }
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(child) => set_in_object(child, rest, value),
        _ => Err(format!("{} is not an object", part.base)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FshCode;
    use fsh_context::testing::{core_index, example_url};
    use pretty_assertions::assert_eq;

    fn observation_profile() -> StructureDefinition {
        let index = core_index();
        let observation = StructureDefinition::fish(&index, "Observation").unwrap();
        observation.derive_profile("obs-profile", "ObsProfile", &example_url("obs-profile"))
    }

    #[test]
    fn derived_profile_starts_without_differential() {
        let profile = observation_profile();
        assert_eq!(profile.header().base_definition.as_deref(), Some("http://hl7.org/fhir/StructureDefinition/Observation"));
        assert_eq!(profile.header().derivation, Some(TypeDerivationRule::Constraint));
        assert_eq!(profile.sd_type(), "Observation");
        assert!(profile.differential().is_empty());

        let resource = profile.to_resource().unwrap();
        assert_eq!(resource["url"], json!(example_url("obs-profile")));
        assert_eq!(resource["differential"]["element"], json!([]));
    }

    #[test]
    fn failed_transaction_restores_elements() {
        let mut profile = observation_profile();
        let mut diagnostics = Diagnostics::new();
        let result: Result<()> = profile.transaction(&mut diagnostics, |sd, diagnostics| {
            sd.element_mut("Observation.status")?.short = Some("changed".into());
            diagnostics.warn("Observation.status", "about to fail");
            Err(Error::InvalidStructureDefinition("abort".into()))
        });
        assert!(result.is_err());
        assert!(profile.differential().is_empty());
        assert!(diagnostics.is_empty());

        profile
            .transaction(&mut diagnostics, |sd, diagnostics| {
                sd.element_mut("Observation.status")?.short = Some("changed".into());
                diagnostics.warn("Observation.status", "kept");
                Ok(())
            })
            .unwrap();
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn caret_values_set_element_properties() {
        let index = core_index();
        let mut profile = observation_profile();
        let mut diagnostics = Diagnostics::new();

        profile
            .set_caret_value(
                Some("Observation.code"),
                "short",
                &FshValue::String("Test code".into()),
                &index,
                &mut diagnostics,
            )
            .unwrap();
        profile
            .set_caret_value(
                Some("Observation.code"),
                "code",
                &FshValue::Code(FshCode::new("1234-5").with_system("http://loinc.org")),
                &index,
                &mut diagnostics,
            )
            .unwrap();
        profile
            .set_caret_value(
                Some("Observation.code"),
                "mapping[1].identity",
                &FshValue::String("w5".into()),
                &index,
                &mut diagnostics,
            )
            .unwrap_err();

        let code = profile.element("Observation.code").unwrap();
        assert_eq!(code.short.as_deref(), Some("Test code"));
        assert_eq!(
            code.code,
            Some(vec![json!({ "system": "http://loinc.org", "code": "1234-5" })])
        );
        let differential = profile.differential();
        assert_eq!(differential.len(), 1);
        assert_eq!(differential[0].id, "Observation.code");
    }

    #[test]
    fn caret_values_set_structure_definition_properties() {
        let index = core_index();
        let mut profile = observation_profile();
        let mut diagnostics = Diagnostics::new();

        profile
            .set_caret_value(None, "status", &FshValue::Code(FshCode::new("active")), &index, &mut diagnostics)
            .unwrap();
        profile
            .set_caret_value(None, "publisher", &FshValue::String("Example".into()), &index, &mut diagnostics)
            .unwrap();
        assert!(profile
            .set_caret_value(None, "snapshot", &FshValue::String("x".into()), &index, &mut diagnostics)
            .is_err());

        assert_eq!(profile.header().status, "active");
        assert_eq!(profile.header().extensions["publisher"], json!("Example"));
    }

    #[test]
    fn specialization_reroots_element_ids() {
        let index = core_index();
        let element = StructureDefinition::fish(&index, "Element").unwrap();
        let model = element
            .derive_specialization(
                "my-model",
                "MyModel",
                "http://example.org/StructureDefinition/MyModel",
                StructureDefinitionKind::Logical,
            )
            .unwrap();

        assert_eq!(model.sd_type(), "http://example.org/StructureDefinition/MyModel");
        assert_eq!(model.root_id(), "MyModel");
        assert!(model.find_element("MyModel.extension").is_some());
        let differential = model.differential();
        assert_eq!(differential.len(), 1);
        assert_eq!(differential[0].id, "MyModel");
    }
}
