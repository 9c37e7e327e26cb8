use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::primitives::{is_valid_integer, is_valid_primitive, minify_xhtml};
use crate::structure::StructureDefinition;
use crate::tree::{is_slice_id, last_segment, parent_id, path_of, sliced_element_id};
use crate::value::{decimal_to_json, instance_json, FshQuantity, FshValue};
use fsh_context::{is_descendant_of, Fishable};
use fsh_models::{
    AssignedValue, AssignmentMode, DataType, DiscriminatorType, ElementDefinitionType,
    SlicingRules, TypedValue,
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};

/// Primitive types whose JSON value is a string.
const STRING_TYPES: &[&str] = &[
    "string",
    "markdown",
    "code",
    "id",
    "uri",
    "url",
    "canonical",
    "oid",
    "uuid",
    "base64Binary",
    "xhtml",
    "date",
    "dateTime",
    "instant",
    "time",
    "integer64",
];

const INTEGER_TYPES: &[&str] = &["integer", "positiveInt", "unsignedInt", "integer64"];

impl StructureDefinition {
    /// Assign a value to an element as `pattern[x]`, or as `fixed[x]` when
    /// `exactly` is set.
    ///
    /// The element must have a single type. An existing value is only replaced
    /// by a value that contains it; assigning a value the existing one already
    /// contains changes nothing.
    pub fn assign_value(
        &mut self,
        id: &str,
        value: &FshValue,
        exactly: bool,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        self.transaction(diagnostics, |sd, diagnostics| {
            sd.assign(id, value, exactly, fisher, diagnostics)
        })
    }

    fn assign(
        &mut self,
        id: &str,
        value: &FshValue,
        exactly: bool,
        fisher: &dyn Fishable,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let element = self.element(id)?;
        let [element_type] = element.types() else {
            return Err(Error::NoSingleType {
                element: id.to_string(),
                count: element.types().len(),
            });
        };
        let (data_type, json) = convert_value(id, element_type, value, fisher)?;
        let mode = if exactly {
            AssignmentMode::Fixed
        } else {
            AssignmentMode::Pattern
        };

        if let Some(existing) = &element.assigned {
            let conflict = || Error::ValueConflict {
                element: id.to_string(),
                existing: existing.value.value.to_string(),
                new: json.to_string(),
            };
            if existing.value.data_type != data_type {
                return Err(conflict());
            }
            let old = &existing.value.value;
            match (existing.mode, mode) {
                (AssignmentMode::Fixed, _) | (AssignmentMode::Pattern, AssignmentMode::Pattern)
                    if is_subset(&json, old) =>
                {
                    diagnostics.debug(id, format!("{} already has the value {}", id, value));
                    return Ok(());
                }
                (AssignmentMode::Pattern, _) if is_subset(old, &json) => {}
                _ => return Err(conflict()),
            }
        }

        if let Some(child) = self.first_conflicting_descendant(id, &json) {
            return Err(Error::ChildValueConflict {
                element: id.to_string(),
                child,
            });
        }

        self.element_mut(id)?.assigned = Some(AssignedValue {
            mode,
            value: TypedValue::new(data_type, json),
        });
        self.require_discriminated_element(id, diagnostics)
    }

    /// First descendant of `id` whose own assigned value disagrees with `value`.
    /// Closed slicing rejects an item only when no slice accepts it.
    fn first_conflicting_descendant(&self, id: &str, value: &Value) -> Option<String> {
        for child_id in self.elements().children(id, true) {
            if is_slice_id(&child_id) {
                continue;
            }
            let items = property_values(value, last_segment(&child_id));
            if items.is_empty() {
                continue;
            }
            let slices = self.elements().direct_slices(&child_id);
            let closed = self
                .find_element(&child_id)
                .and_then(|e| e.slicing.as_ref())
                .is_some_and(|s| s.rules == SlicingRules::Closed);

            for item in items {
                if let Some(conflict) = self.conflict_within(&child_id, item) {
                    return Some(conflict);
                }
                if closed && !slices.is_empty() {
                    let accepted = slices
                        .iter()
                        .any(|slice| self.conflict_within(slice, item).is_none());
                    if !accepted {
                        return slices.first().cloned();
                    }
                }
            }
        }
        None
    }

    /// The element itself or a descendant that disagrees with `value`.
    fn conflict_within(&self, id: &str, value: &Value) -> Option<String> {
        let element = self.find_element(id)?;
        if let Some(assigned) = &element.assigned {
            let existing = &assigned.value.value;
            if !(is_subset(existing, value) || (!assigned.is_fixed() && is_subset(value, existing))) {
                return Some(id.to_string());
            }
        }
        self.first_conflicting_descendant(id, value)
    }

    /// An element a value or pattern discriminator points at must be present
    /// once it carries the value that identifies a slice.
    fn require_discriminated_element(&mut self, id: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut ancestor = Some(id);
        while let Some(candidate) = ancestor {
            if is_slice_id(candidate) {
                let relative = if candidate == id {
                    String::new()
                } else {
                    path_of(&id[candidate.len() + 1..])
                };
                let discriminated = sliced_element_id(candidate)
                    .and_then(|sliced| self.find_element(sliced))
                    .and_then(|sliced| sliced.slicing.as_ref())
                    .is_some_and(|slicing| {
                        slicing.discriminators().iter().any(|d| {
                            matches!(d.discriminator_type, DiscriminatorType::Value | DiscriminatorType::Pattern)
                                && d.path != "$this"
                                && d.path == relative
                        })
                    });
                if discriminated && self.element(id)?.min.unwrap_or(0) == 0 {
                    diagnostics.debug(
                        id,
                        format!("Set the min of {} to 1 since it discriminates slice {}", id, candidate),
                    );
                    self.constrain_cardinality(id, Some(1), None, diagnostics)?;
                }
            }
            ancestor = parent_id(candidate);
        }
        Ok(())
    }
}

/// Values of the property an element id segment names. Choice elements match
/// any `name<Type>` property; lists yield their items.
fn property_values<'a>(value: &'a Value, segment: &str) -> Vec<&'a Value> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };
    let found: Vec<&Value> = match segment.strip_suffix("[x]") {
        Some(prefix) => object
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
            })
            .map(|(_, v)| v)
            .collect(),
        None => object.get(segment).into_iter().collect(),
    };
    found
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

/// Convert a FSH value into the JSON of the element's type.
fn convert_value(
    id: &str,
    element_type: &ElementDefinitionType,
    value: &FshValue,
    fisher: &dyn Fishable,
) -> Result<(DataType, Value)> {
    let code = element_type.code.as_str();
    let mismatch = || Error::MismatchedType {
        element: id.to_string(),
        value_kind: value.kind().to_string(),
        type_code: code.to_string(),
    };
    let invalid = |text: String| Error::InvalidPrimitiveValue {
        element: id.to_string(),
        value: text,
        type_code: code.to_string(),
    };
    let data_type = || DataType::from_code(code).ok_or_else(mismatch);
    let is_quantity = || code == "Quantity" || is_descendant_of(fisher, code, "Quantity");
    let quantity_type = || DataType::from_code(code).unwrap_or(DataType::Quantity);

    let converted = match value {
        FshValue::Boolean(b) if code == "boolean" => (DataType::Boolean, json!(b)),
        FshValue::Number(n) if code == "decimal" => (DataType::Decimal, decimal_to_json(*n)),
        FshValue::Number(n) if INTEGER_TYPES.contains(&code) => {
            let integer = n
                .fract()
                .is_zero()
                .then(|| n.to_i64())
                .flatten()
                .filter(|i| is_valid_integer(code, *i))
                .ok_or_else(|| invalid(n.to_string()))?;
            let json = if code == "integer64" {
                json!(integer.to_string())
            } else {
                json!(integer)
            };
            (data_type()?, json)
        }
        FshValue::String(text) if STRING_TYPES.contains(&code) => {
            if !is_valid_primitive(code, text) {
                return Err(invalid(text.clone()));
            }
            let text = if code == "xhtml" {
                minify_xhtml(text).ok_or_else(|| invalid(text.clone()))?
            } else {
                text.clone()
            };
            (data_type()?, json!(text))
        }
        FshValue::Code(c) => match code {
            "code" => {
                if !is_valid_primitive("code", &c.code) {
                    return Err(invalid(c.code.clone()));
                }
                (DataType::Code, json!(c.code))
            }
            "Coding" => (DataType::Coding, c.to_coding()),
            "CodeableConcept" => (DataType::CodeableConcept, c.to_codeable_concept()),
            "CodeableReference" => (
                DataType::CodeableReference,
                json!({ "concept": c.to_codeable_concept() }),
            ),
            _ if is_quantity() => {
                let unit = FshQuantity {
                    value: None,
                    unit: Some(c.clone()),
                };
                (quantity_type(), unit.to_json())
            }
            _ => return Err(mismatch()),
        },
        FshValue::Quantity(q) if is_quantity() => (quantity_type(), q.to_json()),
        FshValue::Ratio(r) if code == "Ratio" => (
            DataType::Ratio,
            json!({
                "numerator": r.numerator.to_json(),
                "denominator": r.denominator.to_json(),
            }),
        ),
        FshValue::Reference(r) if code == "Reference" => (DataType::Reference, r.to_json()),
        FshValue::Reference(r) if code == "CodeableReference" => (
            DataType::CodeableReference,
            json!({ "reference": r.to_json() }),
        ),
        FshValue::Canonical(c) if matches!(code, "canonical" | "uri" | "url") => {
            (data_type()?, json!(c.resolve(fisher)))
        }
        FshValue::Instance(name) => {
            let data_type = data_type()?;
            let mut instance = instance_json(fisher, name)?;
            if let Some(object) = instance.as_object_mut() {
                if object.get("resourceType").and_then(Value::as_str).is_some_and(|rt| rt != code) {
                    return Err(mismatch());
                }
                object.remove("resourceType");
                object.remove("id");
            }
            (data_type, instance)
        }
        _ => return Err(mismatch()),
    };
    Ok(converted)
}

/// True when every part of `sub` is present in `sup`: objects match key by key,
/// every item of a list matches some item of the other list, numbers compare by
/// value and everything else by equality.
pub fn is_subset(sub: &Value, sup: &Value) -> bool {
    match (sub, sup) {
        (Value::Object(sub), Value::Object(sup)) => sub
            .iter()
            .all(|(key, value)| sup.get(key).is_some_and(|other| is_subset(value, other))),
        (Value::Array(sub), Value::Array(sup)) => sub
            .iter()
            .all(|item| sup.iter().any(|other| is_subset(item, other))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => sub == sup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FshCode;
    use fsh_context::testing::{core_index, example_url};
    use fsh_models::ElementDefinitionDiscriminator;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn observation() -> StructureDefinition {
        let index = core_index();
        StructureDefinition::fish(&index, "Observation")
            .unwrap()
            .derive_profile("p", "P", &example_url("p"))
    }

    fn code(system: &str, code: &str) -> FshValue {
        FshValue::Code(FshCode::new(code).with_system(system))
    }

    fn assigned(sd: &StructureDefinition, id: &str) -> Option<AssignedValue> {
        sd.find_element(id).unwrap().assigned.clone()
    }

    #[test]
    fn subset_matching_is_partial() {
        let coding = json!({ "system": "http://x", "code": "a", "display": "A" });
        assert!(is_subset(&json!({ "system": "http://x" }), &coding));
        assert!(!is_subset(&coding, &json!({ "system": "http://x" })));
        assert!(is_subset(
            &json!({ "coding": [{ "code": "a" }] }),
            &json!({ "coding": [{ "code": "b" }, { "code": "a" }] })
        ));
        assert!(is_subset(&json!(1), &json!(1.0)));
        assert!(!is_subset(&json!("1"), &json!(1)));
    }

    #[test]
    fn assignment_is_idempotent_and_detects_conflicts() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.unfold("Observation.code", &index, &mut diagnostics).unwrap();

        let id = "Observation.code.coding";
        sd.assign_value(id, &code("http://x", "a"), false, &index, &mut diagnostics).unwrap();
        sd.assign_value(id, &code("http://x", "a"), false, &index, &mut diagnostics).unwrap();
        assert_eq!(
            assigned(&sd, id),
            Some(AssignedValue::pattern(DataType::Coding, json!({ "system": "http://x", "code": "a" })))
        );

        let err = sd
            .assign_value(id, &code("http://x", "b"), false, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::ValueConflict { .. }));
    }

    #[test]
    fn patterns_may_grow_into_fixed_values() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();

        sd.assign_value("Observation.code", &code("http://loinc.org", "1234-5"), false, &index, &mut diagnostics)
            .unwrap();
        let detailed = FshValue::Code(
            FshCode::new("1234-5")
                .with_system("http://loinc.org")
                .with_display("Test"),
        );
        sd.assign_value("Observation.code", &detailed, true, &index, &mut diagnostics)
            .unwrap();
        let value = assigned(&sd, "Observation.code").unwrap();
        assert!(value.is_fixed());
        assert_eq!(value.property_name(), "fixedCodeableConcept");

        sd.assign_value("Observation.code", &code("http://loinc.org", "1234-5"), false, &index, &mut diagnostics)
            .unwrap();
        assert!(assigned(&sd, "Observation.code").unwrap().is_fixed());

        let err = sd
            .assign_value("Observation.code", &code("http://loinc.org", "9999-9"), true, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::ValueConflict { .. }));
    }

    #[test]
    fn validates_primitives_and_types() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();

        sd.assign_value("Observation.status", &FshValue::Code(FshCode::new("final")), false, &index, &mut diagnostics)
            .unwrap();
        assert_eq!(
            assigned(&sd, "Observation.status"),
            Some(AssignedValue::pattern(DataType::Code, json!("final")))
        );

        let err = sd
            .assign_value("Observation.issued", &FshValue::String("2024".into()), false, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPrimitiveValue { .. }));

        let err = sd
            .assign_value("Observation.language", &FshValue::Boolean(true), false, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::MismatchedType { .. }));

        let err = sd
            .assign_value("Observation.value[x]", &FshValue::Boolean(true), false, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::NoSingleType { count: 9, .. }));
    }

    #[test]
    fn quantity_subtypes_accept_quantities() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.elements_mut().get_mut("Observation.value[x]").unwrap().types =
            Some(vec![ElementDefinitionType::new("Age")]);

        let age = FshValue::Quantity(FshQuantity::new(
            Decimal::from(42),
            Some(FshCode::new("a").with_system("http://unitsofmeasure.org")),
        ));
        sd.assign_value("Observation.value[x]", &age, false, &index, &mut diagnostics)
            .unwrap();
        let value = assigned(&sd, "Observation.value[x]").unwrap();
        assert_eq!(value.property_name(), "patternAge");
        assert_eq!(
            value.value.value,
            json!({ "value": 42, "system": "http://unitsofmeasure.org", "code": "a" })
        );
    }

    #[test]
    fn parent_values_must_agree_with_child_values() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.unfold("Observation.code", &index, &mut diagnostics).unwrap();
        sd.unfold("Observation.code.coding", &index, &mut diagnostics).unwrap();
        sd.assign_value(
            "Observation.code.coding.system",
            &FshValue::String("http://loinc.org".into()),
            false,
            &index,
            &mut diagnostics,
        )
        .unwrap();

        let err = sd
            .assign_value("Observation.code", &code("http://snomed.info/sct", "123"), false, &index, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::ChildValueConflict { ref child, .. } if child == "Observation.code.coding.system"));
        assert!(assigned(&sd, "Observation.code").is_none());

        sd.assign_value("Observation.code", &code("http://loinc.org", "1234-5"), false, &index, &mut diagnostics)
            .unwrap();
    }

    #[test]
    fn discriminator_elements_become_required() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.slice_it(
            "Observation.component",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Pattern,
                path: "interpretation".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        let slice = sd.add_slice("Observation.component", "high", None).unwrap();
        sd.unfold(&slice, &index, &mut diagnostics).unwrap();

        let id = "Observation.component:high.interpretation";
        sd.assign_value(id, &code("http://x", "H"), false, &index, &mut diagnostics).unwrap();
        assert_eq!(sd.find_element(id).unwrap().min, Some(1));
        assert_eq!(sd.find_element("Observation.component.interpretation").unwrap().min, Some(0));
    }
}
