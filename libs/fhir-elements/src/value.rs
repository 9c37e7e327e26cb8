//! FSH values
//!
//! The right-hand side of assignment and caret rules, as produced by the FSH parser.
//! A value only becomes FHIR JSON once the type of the target element is known.

use crate::error::{Error, Result};
use fsh_context::{FishKind, Fishable};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// A code with optional system and display (`http://loinc.org#1234-5 "Display"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FshCode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl FshCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            system: None,
            code: code.into(),
            display: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// FHIR Coding JSON.
    pub fn to_coding(&self) -> Value {
        let mut coding = Map::new();
        if let Some(system) = &self.system {
            coding.insert("system".into(), json!(system));
        }
        coding.insert("code".into(), json!(self.code));
        if let Some(display) = &self.display {
            coding.insert("display".into(), json!(display));
        }
        Value::Object(coding)
    }

    pub fn to_codeable_concept(&self) -> Value {
        json!({ "coding": [self.to_coding()] })
    }
}

impl fmt::Display for FshCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(system) = &self.system {
            f.write_str(system)?;
        }
        write!(f, "#{}", self.code)?;
        if let Some(display) = &self.display {
            write!(f, " \"{}\"", display)?;
        }
        Ok(())
    }
}

/// A quantity (`5.4 'mg'`); the unit is a UCUM code unless a system is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FshQuantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<FshCode>,
}

impl FshQuantity {
    pub fn new(value: Decimal, unit: Option<FshCode>) -> Self {
        Self {
            value: Some(value),
            unit,
        }
    }

    /// FHIR Quantity JSON.
    pub fn to_json(&self) -> Value {
        let mut quantity = Map::new();
        if let Some(value) = self.value {
            quantity.insert("value".into(), decimal_to_json(value));
        }
        if let Some(unit) = &self.unit {
            if let Some(display) = &unit.display {
                quantity.insert("unit".into(), json!(display));
            }
            if let Some(system) = &unit.system {
                quantity.insert("system".into(), json!(system));
            }
            quantity.insert("code".into(), json!(unit.code));
        }
        Value::Object(quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FshRatio {
    pub numerator: FshQuantity,
    pub denominator: FshQuantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FshReference {
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl FshReference {
    /// FHIR Reference JSON.
    pub fn to_json(&self) -> Value {
        let mut reference = Map::new();
        reference.insert("reference".into(), json!(self.reference));
        if let Some(display) = &self.display {
            reference.insert("display".into(), json!(display));
        }
        Value::Object(reference)
    }
}

/// `Canonical(Entity|version)`: resolved to the entity's URL at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FshCanonical {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl FshCanonical {
    /// The canonical URL of the entity, with the version appended when given.
    /// Entities that cannot be resolved are used as written.
    pub fn resolve(&self, fisher: &dyn Fishable) -> String {
        let url = fisher
            .fish_for_metadata(&self.entity, FishKind::ALL)
            .and_then(|md| md.url)
            .unwrap_or_else(|| {
                tracing::debug!(entity = %self.entity, "Canonical entity not found, using it as written");
                self.entity.clone()
            });
        match &self.version {
            Some(version) => format!("{}|{}", url, version),
            None => url,
        }
    }
}

/// JSON of an instance defined elsewhere, looked up by name or id.
pub fn instance_json(fisher: &dyn Fishable, name: &str) -> Result<Value> {
    fisher
        .fish_for_fhir(name, &[FishKind::Instance])
        .map(|instance| (*instance).clone())
        .ok_or_else(|| Error::DefinitionNotFound {
            item: name.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FshValue {
    Boolean(bool),
    Number(Decimal),
    String(String),
    Code(FshCode),
    Quantity(FshQuantity),
    Ratio(FshRatio),
    Reference(FshReference),
    Canonical(FshCanonical),
    /// Name or id of an instance defined elsewhere
    Instance(String),
}

impl FshValue {
    /// Short name of the value kind, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FshValue::Boolean(_) => "boolean",
            FshValue::Number(_) => "number",
            FshValue::String(_) => "string",
            FshValue::Code(_) => "code",
            FshValue::Quantity(_) => "Quantity",
            FshValue::Ratio(_) => "Ratio",
            FshValue::Reference(_) => "Reference",
            FshValue::Canonical(_) => "Canonical",
            FshValue::Instance(_) => "instance",
        }
    }
}

impl fmt::Display for FshValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FshValue::Boolean(b) => write!(f, "{}", b),
            FshValue::Number(n) => write!(f, "{}", n),
            FshValue::String(s) => write!(f, "\"{}\"", s),
            FshValue::Code(c) => write!(f, "{}", c),
            FshValue::Quantity(q) => {
                if let Some(value) = q.value {
                    write!(f, "{}", value)?;
                }
                if let Some(unit) = &q.unit {
                    write!(f, " '{}'", unit.code)?;
                }
                Ok(())
            }
            FshValue::Ratio(r) => write!(
                f,
                "{} : {}",
                FshValue::Quantity(r.numerator.clone()),
                FshValue::Quantity(r.denominator.clone())
            ),
            FshValue::Reference(r) => write!(f, "Reference({})", r.reference),
            FshValue::Canonical(c) => match &c.version {
                Some(version) => write!(f, "Canonical({}|{})", c.entity, version),
                None => write!(f, "Canonical({})", c.entity),
            },
            FshValue::Instance(name) => f.write_str(name),
        }
    }
}

/// JSON number for a decimal: integral values become integers.
pub fn decimal_to_json(value: Decimal) -> Value {
    if value.fract().is_zero() {
        if let Some(i) = value.to_i64() {
            return json!(i);
        }
    }
    serde_json::from_str(&value.normalize().to_string())
        .ok()
        .filter(Value::is_number)
        .or_else(|| value.to_f64().map(|f| json!(f)))
        .unwrap_or(Value::Null)
}
