//! FHIR StructureDefinition model
//!
//! Version-agnostic model for the StructureDefinition resource. Only the properties the
//! profiling engine reads are named; everything else is carried in `extensions`.

use super::element_definition::{Differential, Snapshot};
use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical URL of the extension that imposes additional profiles on a StructureDefinition.
pub const IMPOSE_PROFILE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-imposeProfile";

/// Canonical URL of the extension marking a logical model as bindable.
pub const TYPE_CHARACTERISTICS_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-type-characteristics";

/// FHIR StructureDefinition resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<Value>>,

    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default = "default_status")]
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_version: Option<String>,

    pub kind: StructureDefinitionKind,

    #[serde(rename = "abstract")]
    pub is_abstract: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<Value>>,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<TypeDerivationRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential: Option<Differential>,

    /// Additional content beyond core fields
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

fn default_resource_type() -> String {
    "StructureDefinition".to_string()
}

fn default_status() -> String {
    "draft".to_string()
}

/// Kind of structure being defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureDefinitionKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

/// How a StructureDefinition relates to its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDerivationRule {
    Specialization,
    Constraint,
}

impl StructureDefinition {
    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        let sd: StructureDefinition = serde_json::from_value(value.clone())?;
        if sd.resource_type != "StructureDefinition" {
            return Err(Error::InvalidResource(format!(
                "expected StructureDefinition, got {}",
                sd.resource_type
            )));
        }
        Ok(sd)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// A constraint on another type (a profile or an extension definition).
    pub fn is_constraint(&self) -> bool {
        self.derivation == Some(TypeDerivationRule::Constraint)
    }

    /// A new type (resource, data type or logical model) rather than a profile.
    pub fn is_specialization(&self) -> bool {
        !self.is_constraint()
    }

    /// Profiles imposed on this definition through the impose-profile extension.
    pub fn imposed_profiles(&self) -> Vec<String> {
        self.extension
            .iter()
            .flatten()
            .filter(|ext| ext.get("url").and_then(Value::as_str) == Some(IMPOSE_PROFILE_EXTENSION))
            .filter_map(|ext| ext.get("valueCanonical").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Logical models may declare that instances can be bound to a value set.
    pub fn is_bindable_logical(&self) -> bool {
        self.kind == StructureDefinitionKind::Logical
            && self.extension.iter().flatten().any(|ext| {
                ext.get("url").and_then(Value::as_str) == Some(TYPE_CHARACTERISTICS_EXTENSION)
                    && ext.get("valueCode").and_then(Value::as_str) == Some("can-bind")
            })
    }
}
