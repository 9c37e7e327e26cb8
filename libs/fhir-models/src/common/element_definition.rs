//! FHIR ElementDefinition model
//!
//! Version-agnostic model for ElementDefinition (used in StructureDefinition snapshots and differentials).
//!
//! ElementDefinition is serialized through an explicit emitter rather than a derived
//! implementation: the property order of the FHIR JSON format is fixed, choice
//! properties (`fixed[x]`, `pattern[x]`, ...) are named after the type of their payload,
//! and `_`-prefixed primitive extension siblings must stay next to their primitive.

use super::data_type::{split_choice_property, DataType};
use super::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum cardinality of an element: a non-negative integer or `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Max {
    Bounded(u32),
    Unbounded,
}

impl Max {
    /// True when a count of `n` is allowed by this maximum.
    pub fn allows(&self, n: u32) -> bool {
        match self {
            Max::Bounded(m) => n <= *m,
            Max::Unbounded => true,
        }
    }
}

impl PartialOrd for Max {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Max {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Max::Bounded(a), Max::Bounded(b)) => a.cmp(b),
            (Max::Bounded(_), Max::Unbounded) => Ordering::Less,
            (Max::Unbounded, Max::Bounded(_)) => Ordering::Greater,
            (Max::Unbounded, Max::Unbounded) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Max {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Max::Bounded(n) => write!(f, "{}", n),
            Max::Unbounded => f.write_str("*"),
        }
    }
}

impl FromStr for Max {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "*" {
            return Ok(Max::Unbounded);
        }
        s.parse::<u32>()
            .map(Max::Bounded)
            .map_err(|_| Error::InvalidFieldValue(format!("invalid max cardinality '{}'", s)))
    }
}

impl Serialize for Max {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Max {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A value held by one of the choice properties, tagged with its data type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub data_type: DataType,
    pub value: Value,
}

impl TypedValue {
    pub fn new(data_type: DataType, value: Value) -> Self {
        Self { data_type, value }
    }
}

/// Whether an assigned value must match exactly (`fixed[x]`) or as a pattern (`pattern[x]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentMode {
    Fixed,
    Pattern,
}

impl AssignmentMode {
    pub fn prefix(&self) -> &'static str {
        match self {
            AssignmentMode::Fixed => "fixed",
            AssignmentMode::Pattern => "pattern",
        }
    }
}

/// The single value-assignment slot of an element: either `fixed[x]` or `pattern[x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedValue {
    pub mode: AssignmentMode,
    pub value: TypedValue,
}

impl AssignedValue {
    pub fn fixed(data_type: DataType, value: Value) -> Self {
        Self {
            mode: AssignmentMode::Fixed,
            value: TypedValue::new(data_type, value),
        }
    }

    pub fn pattern(data_type: DataType, value: Value) -> Self {
        Self {
            mode: AssignmentMode::Pattern,
            value: TypedValue::new(data_type, value),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.mode == AssignmentMode::Fixed
    }

    /// Materialized JSON property name (`fixedCode`, `patternCodeableConcept`, ...).
    pub fn property_name(&self) -> String {
        self.value.data_type.property_name(self.mode.prefix())
    }
}

/// FHIR ElementDefinition - defines an element in a resource or data type structure
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementDefinition {
    /// Unique id for inter-element referencing
    pub id: String,
    pub extension: Option<Vec<Value>>,
    pub modifier_extension: Option<Vec<Value>>,
    /// Path of the element in the hierarchy (e.g., "Patient.name")
    pub path: String,
    pub representation: Option<Vec<String>>,
    /// Name for this particular element (in a slice)
    pub slice_name: Option<String>,
    pub slice_is_constraining: Option<bool>,
    pub label: Option<String>,
    pub code: Option<Vec<Value>>,
    /// This element is sliced - slices follow
    pub slicing: Option<ElementDefinitionSlicing>,
    pub short: Option<String>,
    pub definition: Option<String>,
    pub comment: Option<String>,
    pub requirements: Option<String>,
    pub alias: Option<Vec<String>>,
    pub min: Option<u32>,
    pub max: Option<Max>,
    pub base: Option<ElementDefinitionBase>,
    /// Reference to definition of content if present
    pub content_reference: Option<String>,
    /// Data type and profile for this element
    pub types: Option<Vec<ElementDefinitionType>>,
    pub default_value: Option<TypedValue>,
    pub meaning_when_missing: Option<String>,
    pub order_meaning: Option<String>,
    /// `fixed[x]` or `pattern[x]`
    pub assigned: Option<AssignedValue>,
    pub example: Option<Vec<Value>>,
    pub min_value: Option<TypedValue>,
    pub max_value: Option<TypedValue>,
    pub max_length: Option<i64>,
    pub condition: Option<Vec<String>>,
    pub constraint: Option<Vec<ElementDefinitionConstraint>>,
    pub must_support: Option<bool>,
    pub is_modifier: Option<bool>,
    pub is_modifier_reason: Option<String>,
    pub is_summary: Option<bool>,
    pub binding: Option<ElementDefinitionBinding>,
    pub mapping: Option<Vec<ElementDefinitionMapping>>,
    /// `_`-prefixed siblings of primitive properties, keyed by the primitive's name
    pub primitive_extensions: Map<String, Value>,
    /// Properties this model does not name (version-specific or custom)
    pub other: Map<String, Value>,
}

/// Base definition information for an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionBase {
    /// Path that identifies the base element
    pub path: String,

    /// Min cardinality of the base element
    pub min: u32,

    /// Max cardinality of the base element
    pub max: String,
}

/// Data type for an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinitionType {
    /// Data type code
    pub code: String,

    /// Profile (StructureDefinition canonical URLs) that apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,

    /// Profile (StructureDefinition) for Reference/canonical target types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<Vec<String>>,

    /// Aggregation modes for references (contained | referenced | bundled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Vec<AggregationMode>>,

    /// Versioning rule for references (either | independent | specific)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning: Option<ReferenceVersionRules>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ElementDefinitionType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<String>) -> Self {
        self.profile = (!profiles.is_empty()).then_some(profiles);
        self
    }

    pub fn with_target_profiles(mut self, target_profiles: Vec<String>) -> Self {
        self.target_profile = (!target_profiles.is_empty()).then_some(target_profiles);
        self
    }

    pub fn profiles(&self) -> &[String] {
        self.profile.as_deref().unwrap_or_default()
    }

    pub fn target_profiles(&self) -> &[String] {
        self.target_profile.as_deref().unwrap_or_default()
    }

    /// Reference-like types constrain their targets through `targetProfile`.
    pub fn is_reference_like(&self) -> bool {
        matches!(
            self.code.as_str(),
            "Reference" | "canonical" | "CodeableReference"
        )
    }
}

/// How aggregated references are handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Contained,
    Referenced,
    Bundled,
}

/// How reference versions are handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceVersionRules {
    Either,
    Independent,
    Specific,
}

/// Constraint on an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinitionConstraint {
    /// Target of 'condition' reference
    pub key: String,

    /// Why this constraint is necessary or appropriate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,

    /// Severity (error | warning)
    pub severity: ConstraintSeverity,

    /// Human description of constraint
    pub human: String,

    /// FHIRPath expression of constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// XPath expression of constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    /// Reference to original source of constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Severity of a constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    Error,
    Warning,
}

/// Strength of a value set binding, ordered from weakest to strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    Example,
    Preferred,
    Extensible,
    Required,
}

impl BindingStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStrength::Example => "example",
            BindingStrength::Preferred => "preferred",
            BindingStrength::Extensible => "extensible",
            BindingStrength::Required => "required",
        }
    }
}

impl fmt::Display for BindingStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingStrength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "example" => Ok(BindingStrength::Example),
            "preferred" => Ok(BindingStrength::Preferred),
            "extensible" => Ok(BindingStrength::Extensible),
            "required" => Ok(BindingStrength::Required),
            other => Err(Error::InvalidFieldValue(format!(
                "invalid binding strength '{}'",
                other
            ))),
        }
    }
}

/// ValueSet binding for a coded element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinitionBinding {
    /// Binding strength (required | extensible | preferred | example)
    pub strength: BindingStrength,

    /// Human explanation of the value set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Source of value set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Mapping to another standard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionMapping {
    /// Reference to mapping declaration
    pub identity: String,

    /// Computable language of mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Details of the mapping
    pub map: String,

    /// Comments about the mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Slicing information for an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionSlicing {
    /// Element values that are used to distinguish slices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Vec<ElementDefinitionDiscriminator>>,

    /// Text description of how slicing works
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// If elements must be in same order as slices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,

    /// Slicing rules (closed | open | openAtEnd)
    pub rules: SlicingRules,
}

impl ElementDefinitionSlicing {
    pub fn discriminators(&self) -> &[ElementDefinitionDiscriminator] {
        self.discriminator.as_deref().unwrap_or_default()
    }
}

/// Discriminator for slicing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementDefinitionDiscriminator {
    /// Type of discriminator (value | exists | pattern | type | profile | position)
    #[serde(rename = "type")]
    pub discriminator_type: DiscriminatorType,

    /// Path to element value
    pub path: String,
}

/// Type of slicing discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscriminatorType {
    Value,
    Exists,
    Pattern,
    Type,
    Profile,
    Position,
}

impl FromStr for DiscriminatorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "value" => Ok(Self::Value),
            "exists" => Ok(Self::Exists),
            "pattern" => Ok(Self::Pattern),
            "type" => Ok(Self::Type),
            "profile" => Ok(Self::Profile),
            "position" => Ok(Self::Position),
            other => Err(Error::InvalidFieldValue(format!(
                "invalid discriminator type '{}'",
                other
            ))),
        }
    }
}

/// Slicing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlicingRules {
    Closed,
    Open,
    OpenAtEnd,
}

impl FromStr for SlicingRules {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "openAtEnd" => Ok(Self::OpenAtEnd),
            other => Err(Error::InvalidFieldValue(format!(
                "invalid slicing rules '{}'",
                other
            ))),
        }
    }
}

/// Snapshot - a set of elements that define the structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub element: Vec<ElementDefinition>,
}

/// Differential - a set of elements that define changes from the base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Differential {
    pub element: Vec<ElementDefinition>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Get an element by id
    pub fn get_element(&self, id: &str) -> Option<&ElementDefinition> {
        self.element.iter().find(|e| e.id == id)
    }
}

impl Differential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Get an element by id
    pub fn get_element(&self, id: &str) -> Option<&ElementDefinition> {
        self.element.iter().find(|e| e.id == id)
    }
}

/// Choice property prefixes of ElementDefinition, in emission order.
const DEFAULT_VALUE: &str = "defaultValue";
const MIN_VALUE: &str = "minValue";
const MAX_VALUE: &str = "maxValue";

impl ElementDefinition {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Check if this is a choice type element (ends with [x])
    pub fn is_choice_type(&self) -> bool {
        self.path.ends_with("[x]")
    }

    pub fn types(&self) -> &[ElementDefinitionType] {
        self.types.as_deref().unwrap_or_default()
    }

    /// Get type codes for this element
    pub fn type_codes(&self) -> Vec<String> {
        self.types().iter().map(|t| t.code.clone()).collect()
    }

    /// Cardinality as `min..max` (e.g. "0..1", "1..*"), absent values shown as
    /// their FHIR defaults.
    pub fn cardinality_string(&self) -> String {
        format!("{}..{}", self.min.unwrap_or(0), self.max.unwrap_or(Max::Unbounded))
    }

    /// Parse an element from its FHIR JSON representation.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidResource("ElementDefinition must be an object".into()))?;

        let mut element = ElementDefinition::default();
        let mut has_path = false;

        for (key, val) in obj {
            if let Some(primitive) = key.strip_prefix('_') {
                element
                    .primitive_extensions
                    .insert(primitive.to_string(), val.clone());
                continue;
            }
            match key.as_str() {
                "id" => element.id = string_field(key, val)?,
                "extension" => element.extension = Some(array_field(key, val)?),
                "modifierExtension" => element.modifier_extension = Some(array_field(key, val)?),
                "path" => {
                    element.path = string_field(key, val)?;
                    has_path = true;
                }
                "representation" => element.representation = Some(typed_field(key, val)?),
                "sliceName" => element.slice_name = Some(string_field(key, val)?),
                "sliceIsConstraining" => element.slice_is_constraining = Some(bool_field(key, val)?),
                "label" => element.label = Some(string_field(key, val)?),
                "code" => element.code = Some(array_field(key, val)?),
                "slicing" => element.slicing = Some(typed_field(key, val)?),
                "short" => element.short = Some(string_field(key, val)?),
                "definition" => element.definition = Some(string_field(key, val)?),
                "comment" => element.comment = Some(string_field(key, val)?),
                "requirements" => element.requirements = Some(string_field(key, val)?),
                "alias" => element.alias = Some(typed_field(key, val)?),
                "min" => element.min = Some(typed_field(key, val)?),
                "max" => element.max = Some(typed_field(key, val)?),
                "base" => element.base = Some(typed_field(key, val)?),
                "contentReference" => element.content_reference = Some(string_field(key, val)?),
                "type" => element.types = Some(typed_field(key, val)?),
                "meaningWhenMissing" => element.meaning_when_missing = Some(string_field(key, val)?),
                "orderMeaning" => element.order_meaning = Some(string_field(key, val)?),
                "example" => element.example = Some(array_field(key, val)?),
                "maxLength" => element.max_length = Some(typed_field(key, val)?),
                "condition" => element.condition = Some(typed_field(key, val)?),
                "constraint" => element.constraint = Some(typed_field(key, val)?),
                "mustSupport" => element.must_support = Some(bool_field(key, val)?),
                "isModifier" => element.is_modifier = Some(bool_field(key, val)?),
                "isModifierReason" => element.is_modifier_reason = Some(string_field(key, val)?),
                "isSummary" => element.is_summary = Some(bool_field(key, val)?),
                "binding" => element.binding = Some(typed_field(key, val)?),
                "mapping" => element.mapping = Some(typed_field(key, val)?),
                other => element.read_choice_property(other, val)?,
            }
        }

        if !has_path {
            return Err(Error::MissingField("ElementDefinition.path".into()));
        }
        if element.id.is_empty() {
            element.id = match &element.slice_name {
                Some(slice_name) => format!("{}:{}", element.path, slice_name),
                None => element.path.clone(),
            };
        }
        Ok(element)
    }

    fn read_choice_property(&mut self, key: &str, val: &Value) -> Result<()> {
        let typed = |prefix: &str| {
            split_choice_property(key, prefix).map(|dt| TypedValue::new(dt, val.clone()))
        };

        if let Some(tv) = typed("fixed") {
            self.set_assigned(key, AssignedValue { mode: AssignmentMode::Fixed, value: tv })
        } else if let Some(tv) = typed("pattern") {
            self.set_assigned(key, AssignedValue { mode: AssignmentMode::Pattern, value: tv })
        } else if let Some(tv) = typed(DEFAULT_VALUE) {
            self.default_value = Some(tv);
            Ok(())
        } else if let Some(tv) = typed(MIN_VALUE) {
            self.min_value = Some(tv);
            Ok(())
        } else if let Some(tv) = typed(MAX_VALUE) {
            self.max_value = Some(tv);
            Ok(())
        } else {
            self.other.insert(key.to_string(), val.clone());
            Ok(())
        }
    }

    fn set_assigned(&mut self, key: &str, assigned: AssignedValue) -> Result<()> {
        if let Some(existing) = &self.assigned {
            return Err(Error::InvalidFieldValue(format!(
                "element '{}' declares both {} and {}",
                self.id,
                existing.property_name(),
                key
            )));
        }
        self.assigned = Some(assigned);
        Ok(())
    }

    /// Serialize this element to FHIR JSON, emitting properties in ElementDefinition order.
    pub fn to_json(&self) -> Value {
        let mut out = JsonEmitter::new(&self.primitive_extensions);

        out.emit("id", (!self.id.is_empty()).then(|| Value::String(self.id.clone())));
        out.emit("extension", self.extension.clone().map(Value::Array));
        out.emit("modifierExtension", self.modifier_extension.clone().map(Value::Array));
        out.emit("path", Some(Value::String(self.path.clone())));
        out.emit("representation", to_value(&self.representation));
        out.emit("sliceName", to_value(&self.slice_name));
        out.emit("sliceIsConstraining", to_value(&self.slice_is_constraining));
        out.emit("label", to_value(&self.label));
        out.emit("code", self.code.clone().map(Value::Array));
        out.emit("slicing", to_value(&self.slicing));
        out.emit("short", to_value(&self.short));
        out.emit("definition", to_value(&self.definition));
        out.emit("comment", to_value(&self.comment));
        out.emit("requirements", to_value(&self.requirements));
        out.emit("alias", to_value(&self.alias));
        out.emit("min", to_value(&self.min));
        out.emit("max", to_value(&self.max));
        out.emit("base", to_value(&self.base));
        out.emit("contentReference", to_value(&self.content_reference));
        out.emit("type", to_value(&self.types));
        out.emit_typed(DEFAULT_VALUE, self.default_value.as_ref());
        out.emit("meaningWhenMissing", to_value(&self.meaning_when_missing));
        out.emit("orderMeaning", to_value(&self.order_meaning));
        if let Some(assigned) = &self.assigned {
            out.emit_typed(assigned.mode.prefix(), Some(&assigned.value));
        }
        out.emit("example", self.example.clone().map(Value::Array));
        out.emit_typed(MIN_VALUE, self.min_value.as_ref());
        out.emit_typed(MAX_VALUE, self.max_value.as_ref());
        out.emit("maxLength", to_value(&self.max_length));
        out.emit("condition", to_value(&self.condition));
        out.emit("constraint", to_value(&self.constraint));
        out.emit("mustSupport", to_value(&self.must_support));
        out.emit("isModifier", to_value(&self.is_modifier));
        out.emit("isModifierReason", to_value(&self.is_modifier_reason));
        out.emit("isSummary", to_value(&self.is_summary));
        out.emit("binding", to_value(&self.binding));
        out.emit("mapping", to_value(&self.mapping));

        out.finish(&self.other)
    }
}

/// Writes properties in order, placing each `_name` sibling right after `name`.
struct JsonEmitter<'a> {
    map: Map<String, Value>,
    primitive_extensions: &'a Map<String, Value>,
}

impl<'a> JsonEmitter<'a> {
    fn new(primitive_extensions: &'a Map<String, Value>) -> Self {
        Self {
            map: Map::new(),
            primitive_extensions,
        }
    }

    fn emit(&mut self, name: &str, value: Option<Value>) {
        if let Some(value) = value {
            self.map.insert(name.to_string(), value);
        }
        if let Some(ext) = self.primitive_extensions.get(name) {
            self.map.insert(format!("_{}", name), ext.clone());
        }
    }

    fn emit_typed(&mut self, prefix: &str, value: Option<&TypedValue>) {
        if let Some(tv) = value {
            let name = tv.data_type.property_name(prefix);
            self.emit(&name, Some(tv.value.clone()));
        }
    }

    fn finish(mut self, other: &Map<String, Value>) -> Value {
        for (name, ext) in self.primitive_extensions {
            let key = format!("_{}", name);
            if !self.map.contains_key(&key) {
                self.map.insert(key, ext.clone());
            }
        }
        for (key, value) in other {
            self.map.insert(key.clone(), value.clone());
        }
        Value::Object(self.map)
    }
}

fn to_value<T: Serialize>(field: &Option<T>) -> Option<Value> {
    field.as_ref().and_then(|v| serde_json::to_value(v).ok())
}

fn string_field(key: &str, val: &Value) -> Result<String> {
    val.as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidFieldValue(format!("'{}' must be a string", key)))
}

fn bool_field(key: &str, val: &Value) -> Result<bool> {
    val.as_bool()
        .ok_or_else(|| Error::InvalidFieldValue(format!("'{}' must be a boolean", key)))
}

fn array_field(key: &str, val: &Value) -> Result<Vec<Value>> {
    val.as_array()
        .cloned()
        .ok_or_else(|| Error::InvalidFieldValue(format!("'{}' must be an array", key)))
}

fn typed_field<T: serde::de::DeserializeOwned>(key: &str, val: &Value) -> Result<T> {
    serde_json::from_value(val.clone())
        .map_err(|e| Error::InvalidFieldValue(format!("'{}': {}", key, e)))
}

impl Serialize for ElementDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ElementDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ElementDefinition::from_json(&value).map_err(serde::de::Error::custom)
    }
}
