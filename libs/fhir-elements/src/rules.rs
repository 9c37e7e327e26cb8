//! Rule payloads
//!
//! Strongly typed forms of the FSH rules that constrain elements. The FSH parser
//! (not part of this crate) produces them; they can also be read from JSON.

use crate::diagnostics::SourceInfo;
use crate::value::FshValue;
use fsh_models::{BindingStrength, Max};
use serde::{Deserialize, Serialize};

/// `* path min..max`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRule {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Max>,
    #[serde(default)]
    pub source: SourceInfo,
}

/// The flags of a `* path MS SU ?! TU N D` rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flags {
    pub must_support: bool,
    pub summary: bool,
    pub modifier: bool,
    pub trial_use: bool,
    pub normative: bool,
    pub draft: bool,
}

impl Flags {
    pub fn must_support() -> Self {
        Flags {
            must_support: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRule {
    pub path: String,
    #[serde(flatten)]
    pub flags: Flags,
    #[serde(default)]
    pub source: SourceInfo,
}

/// One alternative of an `only` rule: a type, profile or logical model, optionally
/// wrapped in `Reference(...)`, `Canonical(...)` or `CodeableReference(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlyRuleType {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub is_reference: bool,
    #[serde(default)]
    pub is_canonical: bool,
    #[serde(default)]
    pub is_codeable_reference: bool,
}

impl OnlyRuleType {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn reference(type_name: impl Into<String>) -> Self {
        Self {
            is_reference: true,
            ..Self::new(type_name)
        }
    }

    pub fn canonical(type_name: impl Into<String>) -> Self {
        Self {
            is_canonical: true,
            ..Self::new(type_name)
        }
    }

    pub fn codeable_reference(type_name: impl Into<String>) -> Self {
        Self {
            is_codeable_reference: true,
            ..Self::new(type_name)
        }
    }

    /// Constrains the targets of a reference-like type rather than the type itself.
    pub fn is_reference_like(&self) -> bool {
        self.is_reference || self.is_canonical || self.is_codeable_reference
    }
}

/// `* path only A or Reference(B)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlyRule {
    pub path: String,
    pub types: Vec<OnlyRuleType>,
    #[serde(default)]
    pub source: SourceInfo,
}

/// `* path from ValueSet (strength)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRule {
    pub path: String,
    pub value_set: String,
    #[serde(default = "default_strength")]
    pub strength: BindingStrength,
    #[serde(default)]
    pub source: SourceInfo,
}

fn default_strength() -> BindingStrength {
    BindingStrength::Required
}

/// `* path = value (exactly)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub path: String,
    pub value: FshValue,
    #[serde(default)]
    pub exactly: bool,
    #[serde(default)]
    pub source: SourceInfo,
}

/// One item of a contains rule: `name min..max`, or `Type named name min..max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainsItem {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Max>,
}

/// `* path contains a 0..1 and b 1..*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainsRule {
    pub path: String,
    pub items: Vec<ContainsItem>,
    #[serde(default)]
    pub source: SourceInfo,
}

/// `* path ^caretPath = value`; an empty path targets the StructureDefinition itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaretValueRule {
    #[serde(default)]
    pub path: String,
    pub caret_path: String,
    pub value: FshValue,
    #[serde(default)]
    pub source: SourceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Rule {
    Card(CardRule),
    Flag(FlagRule),
    Only(OnlyRule),
    Binding(BindingRule),
    Assignment(AssignmentRule),
    Contains(ContainsRule),
    CaretValue(CaretValueRule),
}

impl Rule {
    pub fn path(&self) -> &str {
        match self {
            Rule::Card(r) => &r.path,
            Rule::Flag(r) => &r.path,
            Rule::Only(r) => &r.path,
            Rule::Binding(r) => &r.path,
            Rule::Assignment(r) => &r.path,
            Rule::Contains(r) => &r.path,
            Rule::CaretValue(r) => &r.path,
        }
    }

    pub fn path_mut(&mut self) -> &mut String {
        match self {
            Rule::Card(r) => &mut r.path,
            Rule::Flag(r) => &mut r.path,
            Rule::Only(r) => &mut r.path,
            Rule::Binding(r) => &mut r.path,
            Rule::Assignment(r) => &mut r.path,
            Rule::Contains(r) => &mut r.path,
            Rule::CaretValue(r) => &mut r.path,
        }
    }

    pub fn caret_path_mut(&mut self) -> Option<&mut String> {
        match self {
            Rule::CaretValue(r) => Some(&mut r.caret_path),
            _ => None,
        }
    }

    pub fn source(&self) -> &SourceInfo {
        match self {
            Rule::Card(r) => &r.source,
            Rule::Flag(r) => &r.source,
            Rule::Only(r) => &r.source,
            Rule::Binding(r) => &r.source,
            Rule::Assignment(r) => &r.source,
            Rule::Contains(r) => &r.source,
            Rule::CaretValue(r) => &r.source,
        }
    }

    /// Rule keyword, for messages.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Card(_) => "card",
            Rule::Flag(_) => "flag",
            Rule::Only(_) => "only",
            Rule::Binding(_) => "binding",
            Rule::Assignment(_) => "assignment",
            Rule::Contains(_) => "contains",
            Rule::CaretValue(_) => "caret value",
        }
    }
}
