//! Programmatic FHIR definitions for tests
//!
//! A compact subset of the FHIR core types and resources, plus a handful of sample
//! profiles, extensions, value sets and instances. The snapshots only contain the
//! elements the engine tests touch, but follow the shape of the published core
//! definitions (ids, base types, slicing on `extension`, bindings, flags).

use crate::index::DefinitionIndex;
use fsh_models::{IMPOSE_PROFILE_EXTENSION, TYPE_CHARACTERISTICS_EXTENSION};
use serde_json::{json, Map, Value};

pub const FHIR_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";
pub const EXAMPLE_BASE: &str = "http://example.org/StructureDefinition/";
const FHIRPATH_STRING: &str = "http://hl7.org/fhirpath/System.String";

/// Canonical URL of a core definition.
pub fn core_url(name: &str) -> String {
    format!("{}{}", FHIR_BASE, name)
}

/// Canonical URL of a sample definition.
pub fn example_url(id: &str) -> String {
    format!("{}{}", EXAMPLE_BASE, id)
}

/// Builder for StructureDefinition JSON with a snapshot.
#[derive(Debug, Clone)]
pub struct SdBuilder {
    header: Map<String, Value>,
    extensions: Vec<Value>,
    elements: Vec<Value>,
}

impl SdBuilder {
    /// A new type or resource (`derivation = specialization`).
    pub fn specialization(name: &str, kind: &str, base: Option<&str>) -> Self {
        let mut header = Map::new();
        header.insert("id".into(), json!(name));
        header.insert("url".into(), json!(core_url(name)));
        header.insert("version".into(), json!("4.0.1"));
        header.insert("name".into(), json!(name));
        header.insert("status".into(), json!("active"));
        header.insert("fhirVersion".into(), json!("4.0.1"));
        header.insert("kind".into(), json!(kind));
        header.insert("abstract".into(), json!(false));
        header.insert("type".into(), json!(name));
        if let Some(base) = base {
            header.insert("baseDefinition".into(), json!(core_url(base)));
            header.insert("derivation".into(), json!("specialization"));
        }
        Self {
            header,
            extensions: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// A profile of `base`, starting from a copy of the base snapshot.
    pub fn constraint_of(base: &Value, id: &str, name: &str) -> Self {
        let mut builder = Self::specialization(name, "resource", None);
        for key in ["kind", "type", "fhirVersion"] {
            if let Some(value) = base.get(key) {
                builder.header.insert(key.into(), value.clone());
            }
        }
        builder.header.insert("id".into(), json!(id));
        builder.header.insert("url".into(), json!(example_url(id)));
        builder.header.insert("version".into(), json!("1.0.0"));
        builder.header.insert(
            "baseDefinition".into(),
            base.get("url").cloned().unwrap_or(Value::Null),
        );
        builder.header.insert("derivation".into(), json!("constraint"));
        builder.elements = base
            .pointer("/snapshot/element")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        builder
    }

    pub fn url(mut self, url: &str) -> Self {
        self.header.insert("url".into(), json!(url));
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.header.insert("abstract".into(), json!(true));
        self
    }

    pub fn sd_type(mut self, sd_type: &str) -> Self {
        self.header.insert("type".into(), json!(sd_type));
        self
    }

    pub fn extension(mut self, extension: Value) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Append an element. `types` use a compact notation:
    /// `Reference(Patient|Group)` for target profiles and `Extension<url>` for a profile.
    pub fn element(self, id: &str, min: u32, max: &str, types: &[&str]) -> Self {
        self.element_with(id, min, max, types, json!({}))
    }

    /// Append an element with extra properties merged in.
    pub fn element_with(mut self, id: &str, min: u32, max: &str, types: &[&str], extra: Value) -> Self {
        let path = path_of(id);
        let mut element = Map::new();
        element.insert("id".into(), json!(id));
        element.insert("path".into(), json!(path));
        element.insert("min".into(), json!(min));
        element.insert("max".into(), json!(max));
        element.insert(
            "base".into(),
            json!({ "path": path, "min": min, "max": max }),
        );
        if !types.is_empty() {
            element.insert(
                "type".into(),
                Value::Array(types.iter().map(|t| type_json(t)).collect()),
            );
        }
        if let Some(extra) = extra.as_object() {
            for (key, value) in extra {
                element.insert(key.clone(), value.clone());
            }
        }
        self.elements.push(Value::Object(element));
        self
    }

    /// `id`, `extension` (and optionally `modifierExtension`) children of `root`.
    pub fn base_children(self, root: &str, modifier_extension: bool) -> Self {
        let builder = self
            .element(&format!("{}.id", root), 0, "1", &[FHIRPATH_STRING])
            .element_with(
                &format!("{}.extension", root),
                0,
                "*",
                &["Extension"],
                extension_slicing(),
            );
        if modifier_extension {
            builder.element_with(
                &format!("{}.modifierExtension", root),
                0,
                "*",
                &["Extension"],
                json!({
                    "isModifier": true,
                    "isModifierReason": "Modifier extensions are expected to modify the meaning of the element",
                    "slicing": extension_slicing()["slicing"].clone()
                }),
            )
        } else {
            builder
        }
    }

    /// Merge properties into an existing element (removing those set to `null`).
    pub fn set(mut self, id: &str, properties: Value) -> Self {
        let Some(element) = self
            .elements
            .iter_mut()
            .find(|e| e.get("id").and_then(Value::as_str) == Some(id))
            .and_then(Value::as_object_mut)
        else {
            panic!("no element '{}' to modify", id);
        };
        if let Some(properties) = properties.as_object() {
            for (key, value) in properties {
                if value.is_null() {
                    element.remove(key);
                } else {
                    element.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    pub fn build(self) -> Value {
        let mut sd = Map::new();
        sd.insert("resourceType".into(), json!("StructureDefinition"));
        for (key, value) in self.header {
            let is_id = key == "id";
            sd.insert(key, value);
            if is_id && !self.extensions.is_empty() {
                sd.insert("extension".into(), Value::Array(self.extensions.clone()));
            }
        }
        sd.insert("snapshot".into(), json!({ "element": self.elements }));
        Value::Object(sd)
    }
}

fn extension_slicing() -> Value {
    json!({
        "slicing": {
            "discriminator": [{ "type": "value", "path": "url" }],
            "description": "Extensions are always sliced by (at least) url",
            "rules": "open"
        }
    })
}

/// Element path for an element id (slice qualifiers removed).
fn path_of(id: &str) -> String {
    id.split('.')
        .map(|segment| segment.split(':').next().unwrap_or(segment))
        .collect::<Vec<_>>()
        .join(".")
}

fn canonical(name: &str) -> String {
    if name.contains("://") {
        name.to_string()
    } else {
        core_url(name)
    }
}

fn type_json(spec: &str) -> Value {
    if let Some((code, rest)) = spec.split_once('(') {
        let targets: Vec<String> = rest
            .trim_end_matches(')')
            .split('|')
            .map(canonical)
            .collect();
        return json!({ "code": code, "targetProfile": targets });
    }
    if let Some((code, rest)) = spec.split_once('<') {
        return json!({ "code": code, "profile": [canonical(rest.trim_end_matches('>'))] });
    }
    json!({ "code": spec })
}

fn primitive(name: &str, base: &str) -> Value {
    SdBuilder::specialization(name, "primitive-type", Some(base))
        .element(name, 0, "*", &[])
        .base_children(name, false)
        .element(&format!("{}.value", name), 0, "1", &[FHIRPATH_STRING])
        .build()
}

fn complex(name: &str) -> SdBuilder {
    SdBuilder::specialization(name, "complex-type", Some("Element"))
        .element(name, 0, "*", &[])
        .base_children(name, false)
}

fn resource(name: &str) -> SdBuilder {
    SdBuilder::specialization(name, "resource", Some("DomainResource"))
        .element(name, 0, "*", &[])
        .element(&format!("{}.id", name), 0, "1", &[FHIRPATH_STRING])
        .element(&format!("{}.language", name), 0, "1", &["code"])
        .element(&format!("{}.contained", name), 0, "*", &["Resource"])
        .element_with(
            &format!("{}.extension", name),
            0,
            "*",
            &["Extension"],
            extension_slicing(),
        )
        .element_with(
            &format!("{}.modifierExtension", name),
            0,
            "*",
            &["Extension"],
            json!({
                "isModifier": true,
                "slicing": extension_slicing()["slicing"].clone()
            }),
        )
}

fn quantity_elements(builder: SdBuilder) -> SdBuilder {
    builder
        .element("Quantity.value", 0, "1", &["decimal"])
        .element_with(
            "Quantity.comparator",
            0,
            "1",
            &["code"],
            json!({
                "isModifier": true,
                "binding": {
                    "strength": "required",
                    "valueSet": "http://hl7.org/fhir/ValueSet/quantity-comparator|4.0.1"
                }
            }),
        )
        .element("Quantity.unit", 0, "1", &["string"])
        .element("Quantity.system", 0, "1", &["uri"])
        .element("Quantity.code", 0, "1", &["code"])
}

fn element() -> Value {
    SdBuilder::specialization("Element", "complex-type", None)
        .abstract_type()
        .element("Element", 0, "*", &[])
        .base_children("Element", false)
        .build()
}

fn backbone_element() -> Value {
    SdBuilder::specialization("BackboneElement", "complex-type", Some("Element"))
        .abstract_type()
        .element("BackboneElement", 0, "*", &[])
        .base_children("BackboneElement", true)
        .build()
}

fn coding() -> Value {
    complex("Coding")
        .element_with("Coding.system", 0, "1", &["uri"], json!({ "isSummary": true }))
        .element_with("Coding.version", 0, "1", &["string"], json!({ "isSummary": true }))
        .element_with("Coding.code", 0, "1", &["code"], json!({ "isSummary": true }))
        .element_with("Coding.display", 0, "1", &["string"], json!({ "isSummary": true }))
        .element("Coding.userSelected", 0, "1", &["boolean"])
        .build()
}

fn codeable_concept() -> Value {
    complex("CodeableConcept")
        .element_with("CodeableConcept.coding", 0, "*", &["Coding"], json!({ "isSummary": true }))
        .element_with("CodeableConcept.text", 0, "1", &["string"], json!({ "isSummary": true }))
        .build()
}

fn codeable_reference() -> Value {
    complex("CodeableReference")
        .element("CodeableReference.concept", 0, "1", &["CodeableConcept"])
        .element("CodeableReference.reference", 0, "1", &["Reference"])
        .build()
}

fn quantity() -> Value {
    quantity_elements(complex("Quantity")).build()
}

/// A constraint on Quantity published under its own type name, like Age.
fn quantity_profile(name: &str) -> Value {
    let base = quantity();
    SdBuilder::constraint_of(&base, name, name)
        .url(&core_url(name))
        .build()
}

fn simple_quantity() -> Value {
    let base = quantity();
    SdBuilder::constraint_of(&base, "SimpleQuantity", "SimpleQuantity")
        .url(&core_url("SimpleQuantity"))
        .set("Quantity.comparator", json!({ "max": "0" }))
        .build()
}

/// A made-up specialization of the non-abstract Quantity type.
fn special_quantity() -> Value {
    SdBuilder::specialization("SpecialQuantity", "complex-type", Some("Quantity"))
        .url(&example_url("SpecialQuantity"))
        .element("SpecialQuantity", 0, "*", &[])
        .base_children("SpecialQuantity", false)
        .element("SpecialQuantity.value", 0, "1", &["decimal"])
        .build()
}

fn ratio() -> Value {
    complex("Ratio")
        .element("Ratio.numerator", 0, "1", &["Quantity"])
        .element("Ratio.denominator", 0, "1", &["Quantity"])
        .build()
}

fn period() -> Value {
    complex("Period")
        .element("Period.start", 0, "1", &["dateTime"])
        .element("Period.end", 0, "1", &["dateTime"])
        .build()
}

fn identifier() -> Value {
    complex("Identifier")
        .element_with("Identifier.use", 0, "1", &["code"], json!({ "isModifier": true }))
        .element("Identifier.type", 0, "1", &["CodeableConcept"])
        .element("Identifier.system", 0, "1", &["uri"])
        .element("Identifier.value", 0, "1", &["string"])
        .element("Identifier.period", 0, "1", &["Period"])
        .element("Identifier.assigner", 0, "1", &["Reference(Organization)"])
        .build()
}

fn reference() -> Value {
    complex("Reference")
        .element("Reference.reference", 0, "1", &["string"])
        .element("Reference.type", 0, "1", &["uri"])
        .element("Reference.identifier", 0, "1", &["Identifier"])
        .element("Reference.display", 0, "1", &["string"])
        .build()
}

fn human_name() -> Value {
    complex("HumanName")
        .element("HumanName.use", 0, "1", &["code"])
        .element("HumanName.text", 0, "1", &["string"])
        .element("HumanName.family", 0, "1", &["string"])
        .element("HumanName.given", 0, "*", &["string"])
        .build()
}

fn extension() -> Value {
    complex("Extension")
        .element("Extension.url", 1, "1", &["uri"])
        .element(
            "Extension.value[x]",
            0,
            "1",
            &[
                "base64Binary",
                "boolean",
                "canonical",
                "code",
                "dateTime",
                "decimal",
                "integer",
                "string",
                "uri",
                "Age",
                "CodeableConcept",
                "Coding",
                "Identifier",
                "Period",
                "Quantity",
                "Reference",
            ],
        )
        .build()
}

fn resource_base() -> Value {
    SdBuilder::specialization("Resource", "resource", None)
        .abstract_type()
        .element("Resource", 0, "*", &[])
        .element("Resource.id", 0, "1", &[FHIRPATH_STRING])
        .element("Resource.language", 0, "1", &["code"])
        .build()
}

fn domain_resource() -> Value {
    SdBuilder::specialization("DomainResource", "resource", Some("Resource"))
        .abstract_type()
        .element("DomainResource", 0, "*", &[])
        .element("DomainResource.id", 0, "1", &[FHIRPATH_STRING])
        .element("DomainResource.language", 0, "1", &["code"])
        .element("DomainResource.contained", 0, "*", &["Resource"])
        .element_with(
            "DomainResource.extension",
            0,
            "*",
            &["Extension"],
            extension_slicing(),
        )
        .element_with(
            "DomainResource.modifierExtension",
            0,
            "*",
            &["Extension"],
            json!({ "isModifier": true, "slicing": extension_slicing()["slicing"].clone() }),
        )
        .build()
}

fn patient() -> Value {
    resource("Patient")
        .element_with("Patient.identifier", 0, "*", &["Identifier"], json!({ "isSummary": true }))
        .element_with(
            "Patient.active",
            0,
            "1",
            &["boolean"],
            json!({ "isModifier": true, "isSummary": true }),
        )
        .element_with("Patient.name", 0, "*", &["HumanName"], json!({ "isSummary": true }))
        .element_with(
            "Patient.gender",
            0,
            "1",
            &["code"],
            json!({
                "isSummary": true,
                "binding": {
                    "strength": "required",
                    "valueSet": "http://hl7.org/fhir/ValueSet/administrative-gender|4.0.1"
                }
            }),
        )
        .element("Patient.birthDate", 0, "1", &["date"])
        .element_with(
            "Patient.deceased[x]",
            0,
            "1",
            &["boolean", "dateTime"],
            json!({ "isModifier": true }),
        )
        .element(
            "Patient.managingOrganization",
            0,
            "1",
            &["Reference(Organization)"],
        )
        .element("Patient.link", 0, "*", &["BackboneElement"])
        .base_children("Patient.link", true)
        .element("Patient.link.other", 1, "1", &["Reference(Patient|RelatedPerson)"])
        .element("Patient.link.type", 1, "1", &["code"])
        .build()
}

fn observation() -> Value {
    let value_types = [
        "Quantity",
        "CodeableConcept",
        "string",
        "boolean",
        "integer",
        "Ratio",
        "Period",
        "time",
        "dateTime",
    ];
    resource("Observation")
        .element("Observation.identifier", 0, "*", &["Identifier"])
        .element_with(
            "Observation.status",
            1,
            "1",
            &["code"],
            json!({
                "isModifier": true,
                "isSummary": true,
                "binding": {
                    "strength": "required",
                    "valueSet": "http://hl7.org/fhir/ValueSet/observation-status|4.0.1"
                }
            }),
        )
        .element("Observation.category", 0, "*", &["CodeableConcept"])
        .element_with(
            "Observation.code",
            1,
            "1",
            &["CodeableConcept"],
            json!({
                "isSummary": true,
                "binding": {
                    "strength": "example",
                    "valueSet": "http://hl7.org/fhir/ValueSet/observation-codes"
                }
            }),
        )
        .element(
            "Observation.subject",
            0,
            "1",
            &["Reference(Patient|Group|Device|Location)"],
        )
        .element("Observation.focus", 0, "*", &["Reference(Resource)"])
        .element(
            "Observation.effective[x]",
            0,
            "1",
            &["dateTime", "Period", "instant"],
        )
        .element("Observation.issued", 0, "1", &["instant"])
        .element(
            "Observation.performer",
            0,
            "*",
            &["Reference(Practitioner|Organization|Patient|RelatedPerson)"],
        )
        .element("Observation.value[x]", 0, "1", &value_types)
        .element("Observation.interpretation", 0, "*", &["CodeableConcept"])
        .element("Observation.hasMember", 0, "*", &["Reference(Observation)"])
        .element("Observation.component", 0, "*", &["BackboneElement"])
        .base_children("Observation.component", true)
        .element_with(
            "Observation.component.code",
            1,
            "1",
            &["CodeableConcept"],
            json!({
                "binding": {
                    "strength": "example",
                    "valueSet": "http://hl7.org/fhir/ValueSet/observation-codes"
                }
            }),
        )
        .element(
            "Observation.component.value[x]",
            0,
            "1",
            &["Quantity", "CodeableConcept", "string"],
        )
        .element(
            "Observation.component.interpretation",
            0,
            "*",
            &["CodeableConcept"],
        )
        .build()
}

fn procedure() -> Value {
    resource("Procedure")
        .element("Procedure.instantiatesCanonical", 0, "*", &["canonical(Questionnaire)"])
        .element("Procedure.status", 1, "1", &["code"])
        .element("Procedure.reason", 0, "*", &["CodeableReference(Observation|Condition)"])
        .build()
}

fn questionnaire() -> Value {
    resource("Questionnaire")
        .element("Questionnaire.url", 0, "1", &["uri"])
        .element("Questionnaire.status", 1, "1", &["code"])
        .element("Questionnaire.item", 0, "*", &["BackboneElement"])
        .base_children("Questionnaire.item", true)
        .element("Questionnaire.item.linkId", 1, "1", &["string"])
        .element("Questionnaire.item.text", 0, "1", &["string"])
        .element("Questionnaire.item.type", 1, "1", &["code"])
        .element_with(
            "Questionnaire.item.item",
            0,
            "*",
            &[],
            json!({ "contentReference": "#Questionnaire.item" }),
        )
        .build()
}

fn minimal_resource(name: &str) -> Value {
    resource(name)
        .element(&format!("{}.name", name), 0, "1", &["string"])
        .build()
}

fn my_patient(patient: &Value) -> Value {
    SdBuilder::constraint_of(patient, "my-patient", "MyPatient")
        .set("Patient.name", json!({ "min": 1 }))
        .build()
}

fn my_observation(observation: &Value) -> Value {
    SdBuilder::constraint_of(observation, "my-observation", "MyObservation")
        .set("Observation.subject", json!({ "min": 1 }))
        .build()
}

fn child_observation(my_observation: &Value) -> Value {
    SdBuilder::constraint_of(my_observation, "child-observation", "ChildObservation").build()
}

fn base_obs(observation: &Value) -> Value {
    SdBuilder::constraint_of(observation, "base-obs", "BaseObservation").build()
}

fn imposing_obs(observation: &Value) -> Value {
    SdBuilder::constraint_of(observation, "imposing-obs", "ImposingObservation")
        .extension(json!({
            "url": IMPOSE_PROFILE_EXTENSION,
            "valueCanonical": example_url("base-obs")
        }))
        .build()
}

fn extension_profile(
    extension: &Value,
    id: &str,
    name: &str,
    value_type: &str,
    modifier: bool,
) -> Value {
    let mut builder = SdBuilder::constraint_of(extension, id, name)
        .set("Extension.extension", json!({ "max": "0" }))
        .set("Extension.url", json!({ "fixedUri": example_url(id) }))
        .set("Extension.value[x]", json!({ "type": [type_json(value_type)] }));
    if modifier {
        builder = builder.set(
            "Extension",
            json!({ "isModifier": true, "isModifierReason": "Changes the meaning of the element" }),
        );
    }
    builder.build()
}

fn my_logical() -> Value {
    SdBuilder::specialization("MyLogical", "logical", Some("Element"))
        .url(&example_url("MyLogical"))
        .sd_type(&example_url("MyLogical"))
        .extension(json!({
            "url": TYPE_CHARACTERISTICS_EXTENSION,
            "valueCode": "can-bind"
        }))
        .element("MyLogical", 0, "*", &[])
        .element("MyLogical.code", 0, "1", &["code"])
        .element("MyLogical.note", 0, "1", &["string"])
        .build()
}

fn value_set(id: &str, url: &str, version: &str) -> Value {
    json!({
        "resourceType": "ValueSet",
        "id": id,
        "url": url,
        "version": version,
        "name": id.replace('-', "_"),
        "status": "active"
    })
}

fn patient_example() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "patient-example",
        "name": [{ "family": "Example", "given": ["Pat"] }],
        "gender": "unknown"
    })
}

/// Every definition of the test subset, dependencies first.
pub fn core_definitions() -> Vec<Value> {
    let patient = patient();
    let observation = observation();
    let extension_sd = extension();
    let my_observation = my_observation(&observation);

    let mut definitions = vec![element(), backbone_element()];
    for (name, base) in [
        ("boolean", "Element"),
        ("integer", "Element"),
        ("decimal", "Element"),
        ("string", "Element"),
        ("uri", "Element"),
        ("dateTime", "Element"),
        ("date", "Element"),
        ("time", "Element"),
        ("instant", "Element"),
        ("base64Binary", "Element"),
        ("xhtml", "Element"),
        ("code", "string"),
        ("id", "string"),
        ("markdown", "string"),
        ("url", "uri"),
        ("canonical", "uri"),
        ("oid", "uri"),
        ("uuid", "uri"),
        ("positiveInt", "integer"),
        ("unsignedInt", "integer"),
    ] {
        definitions.push(primitive(name, base));
    }
    definitions.extend([
        coding(),
        codeable_concept(),
        codeable_reference(),
        quantity(),
        quantity_profile("Age"),
        simple_quantity(),
        special_quantity(),
        ratio(),
        period(),
        identifier(),
        reference(),
        human_name(),
        extension_sd.clone(),
        resource_base(),
        domain_resource(),
        patient.clone(),
        observation.clone(),
        procedure(),
        questionnaire(),
    ]);
    for name in [
        "Organization",
        "Group",
        "Device",
        "Location",
        "Practitioner",
        "RelatedPerson",
        "Condition",
    ] {
        definitions.push(minimal_resource(name));
    }
    definitions.extend([
        my_patient(&patient),
        child_observation(&my_observation),
        my_observation,
        base_obs(&observation),
        imposing_obs(&observation),
        extension_profile(&extension_sd, "my-extension", "MyExtension", "string", false),
        extension_profile(
            &extension_sd,
            "my-modifier-extension",
            "MyModifierExtension",
            "boolean",
            true,
        ),
        my_logical(),
        value_set(
            "administrative-gender",
            "http://hl7.org/fhir/ValueSet/administrative-gender",
            "4.0.1",
        ),
        value_set(
            "observation-status",
            "http://hl7.org/fhir/ValueSet/observation-status",
            "4.0.1",
        ),
        value_set("my-vs", "http://example.org/ValueSet/my-vs", "1.0.0"),
        patient_example(),
    ]);
    definitions
}

/// An index over [`core_definitions`].
pub fn core_index() -> DefinitionIndex {
    let mut index = DefinitionIndex::new();
    for definition in core_definitions() {
        if let Err(e) = index.add(definition) {
            panic!("test definition rejected: {}", e);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fishable::{FishKind, Fishable};
    use crate::lineage::{lineage, LineageOptions};

    #[test]
    fn core_subset_resolves() {
        let index = core_index();
        let age = index.fish_for_metadata("Age", &[FishKind::Profile]).unwrap();
        assert_eq!(age.sd_type.as_deref(), Some("Quantity"));
        assert!(age.is_constraint());

        let ext = index
            .fish_for_metadata("my-extension", &[FishKind::Extension])
            .unwrap();
        assert_eq!(ext.sd_type.as_deref(), Some("Extension"));

        let logical = index
            .fish_for_metadata("MyLogical", &[FishKind::Logical])
            .unwrap();
        assert!(logical.can_bind);
        assert_eq!(logical.type_code(), Some("http://example.org/StructureDefinition/MyLogical"));
    }

    #[test]
    fn profiles_chain_to_resource() {
        let index = core_index();
        let ids: Vec<String> = lineage(&index, "child-observation", LineageOptions::default())
            .into_iter()
            .map(|md| md.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "child-observation",
                "my-observation",
                "Observation",
                "DomainResource",
                "Resource"
            ]
        );
    }

    #[test]
    fn profile_snapshots_copy_their_base() {
        let index = core_index();
        let sd = index
            .fish_for_structure("my-patient", &[FishKind::Profile])
            .unwrap();
        let snapshot = sd.snapshot.unwrap();
        let name = snapshot.get_element("Patient.name").unwrap();
        assert_eq!(name.min, Some(1));
        assert_eq!(snapshot.element[0].id, "Patient");
    }
}
