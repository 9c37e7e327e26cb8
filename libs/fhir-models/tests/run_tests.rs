use fsh_models::common::{
    AssignmentMode, DataType, Max, StructureDefinition, StructureDefinitionKind,
    TypeDerivationRule,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn observation_profile() -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "id": "vital-sign",
        "url": "http://example.org/StructureDefinition/vital-sign",
        "name": "VitalSign",
        "status": "draft",
        "fhirVersion": "4.0.1",
        "kind": "resource",
        "abstract": false,
        "type": "Observation",
        "baseDefinition": "http://hl7.org/fhir/StructureDefinition/Observation",
        "derivation": "constraint",
        "snapshot": {
            "element": [
                { "id": "Observation", "path": "Observation", "min": 0, "max": "*" },
                {
                    "id": "Observation.status",
                    "path": "Observation.status",
                    "min": 1,
                    "max": "1",
                    "type": [{ "code": "code" }],
                    "fixedCode": "final"
                },
                {
                    "id": "Observation.value[x]",
                    "path": "Observation.value[x]",
                    "min": 0,
                    "max": "1",
                    "type": [{ "code": "Quantity" }, { "code": "string" }]
                }
            ]
        },
        "differential": {
            "element": [
                { "id": "Observation.status", "path": "Observation.status", "fixedCode": "final" }
            ]
        }
    })
}

#[test]
fn parse_profile_with_snapshot_and_differential() {
    let sd = StructureDefinition::from_value(&observation_profile()).unwrap();

    assert_eq!(sd.kind, StructureDefinitionKind::Resource);
    assert_eq!(sd.derivation, Some(TypeDerivationRule::Constraint));
    assert_eq!(sd.type_, "Observation");

    let snapshot = sd.snapshot.as_ref().expect("snapshot should be present");
    assert_eq!(snapshot.element.len(), 3);

    let status = snapshot.get_element("Observation.status").unwrap();
    let assigned = status.assigned.as_ref().unwrap();
    assert_eq!(assigned.mode, AssignmentMode::Fixed);
    assert_eq!(assigned.value.data_type, DataType::Code);
    assert_eq!(status.max, Some(Max::Bounded(1)));

    let value = snapshot.get_element("Observation.value[x]").unwrap();
    assert_eq!(value.type_codes(), vec!["Quantity", "string"]);
}

#[test]
fn round_trips_structure_definition_json() {
    let input = observation_profile();
    let sd = StructureDefinition::from_value(&input).unwrap();
    let output = sd.to_value().unwrap();

    assert_eq!(output["snapshot"], input["snapshot"]);
    assert_eq!(output["differential"], input["differential"]);
    assert_eq!(output["baseDefinition"], input["baseDefinition"]);
}
