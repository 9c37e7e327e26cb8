//! End-to-end behaviour of constraint rules on a profile of Observation

use fsh_elements::{
    apply_diff, apply_rules, AssignmentRule, BindingRule, BindingStrength, CardRule, ContainsItem,
    ContainsRule, Diagnostics, ElementDefinitionType, Error, FlagRule, Flags, FshCode, FshValue,
    Max, OnlyRule, OnlyRuleType, Rule, SourceInfo,
};
use fsh_models::{DiscriminatorType, ElementDefinitionDiscriminator, SlicingRules};
use pretty_assertions::assert_eq;
use serde_json::json;

mod test_support;

fn card(path: &str, min: Option<u32>, max: Option<Max>) -> Rule {
    Rule::Card(CardRule {
        path: path.into(),
        min,
        max,
        source: SourceInfo::default(),
    })
}

fn pattern_discriminator(path: &str) -> ElementDefinitionDiscriminator {
    ElementDefinitionDiscriminator {
        discriminator_type: DiscriminatorType::Pattern,
        path: path.into(),
    }
}

#[test]
fn cardinality_narrows_and_never_widens() {
    let mut sd = test_support::profile_of("Observation", "narrow");
    let mut diagnostics = Diagnostics::new();

    sd.constrain_cardinality("Observation.subject", Some(1), Some(Max::Bounded(1)), &mut diagnostics)
        .unwrap();
    let subject = sd.find_element("Observation.subject").unwrap();
    assert_eq!((subject.min, subject.max), (Some(1), Some(Max::Bounded(1))));

    let err = sd
        .constrain_cardinality("Observation.subject", Some(0), Some(Max::Bounded(1)), &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, Error::WideningCardinality { .. }));
}

#[test]
fn only_rule_leaves_exactly_the_requested_type() {
    let core = test_support::core();
    let mut sd = test_support::profile_of("Observation", "only-string");
    let mut diagnostics = Diagnostics::new();
    let mut rules = vec![Rule::Only(OnlyRule {
        path: "value[x]".into(),
        types: vec![OnlyRuleType::new("string")],
        source: SourceInfo::default(),
    })];
    apply_rules(&mut sd, &mut rules, core, &mut diagnostics);
    assert!(!diagnostics.has_errors());

    let value = sd.find_element("Observation.value[x]").unwrap();
    assert_eq!(value.types(), &[ElementDefinitionType::new("string")]);

    let diff = sd.differential();
    let value_diff = diff.iter().find(|e| e.id == "Observation.value[x]").unwrap();
    assert_eq!(value_diff.types(), &[ElementDefinitionType::new("string")]);
    assert_eq!(value_diff.min, None);
}

#[test]
fn must_support_reaches_existing_slices() {
    let core = test_support::core();
    let mut sd = test_support::profile_of("Observation", "ms");
    let mut diagnostics = Diagnostics::new();
    sd.slice_it("Observation.component", pattern_discriminator("code"), false, SlicingRules::Open)
        .unwrap();

    let mut rules = vec![
        Rule::Contains(ContainsRule {
            path: "component".into(),
            items: ["systolic", "diastolic"]
                .into_iter()
                .map(|name| ContainsItem {
                    name: name.into(),
                    type_name: None,
                    min: Some(0),
                    max: Some(Max::Bounded(1)),
                })
                .collect(),
            source: SourceInfo::default(),
        }),
        // Touching the slice children unfolds them.
        Rule::Card(CardRule {
            path: "component[systolic].code".into(),
            min: None,
            max: None,
            source: SourceInfo::default(),
        }),
        Rule::Card(CardRule {
            path: "component[diastolic].code".into(),
            min: None,
            max: None,
            source: SourceInfo::default(),
        }),
        Rule::Flag(FlagRule {
            path: "component.code".into(),
            flags: Flags::must_support(),
            source: SourceInfo::default(),
        }),
    ];
    apply_rules(&mut sd, &mut rules, core, &mut diagnostics);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    for id in [
        "Observation.component.code",
        "Observation.component:systolic.code",
        "Observation.component:diastolic.code",
    ] {
        assert_eq!(sd.find_element(id).unwrap().must_support, Some(true), "{}", id);
    }
}

#[test]
fn repeated_assignment_is_a_no_op_and_conflicts_are_rejected() {
    let core = test_support::core();
    let mut sd = test_support::profile_of("Observation", "assigned");
    let mut diagnostics = Diagnostics::new();
    let loinc = FshValue::Code(FshCode::new("8480-6").with_system("http://loinc.org"));

    sd.assign_value("Observation.code", &loinc, false, core, &mut diagnostics)
        .unwrap();
    let first = sd.find_element("Observation.code").unwrap().clone();
    sd.assign_value("Observation.code", &loinc, false, core, &mut diagnostics)
        .unwrap();
    assert_eq!(sd.find_element("Observation.code").unwrap(), &first);
    assert_eq!(
        first.assigned.as_ref().map(|a| a.value.value.clone()),
        Some(json!({ "coding": [{ "system": "http://loinc.org", "code": "8480-6" }] }))
    );

    let other = FshValue::Code(FshCode::new("8462-4").with_system("http://loinc.org"));
    let err = sd
        .assign_value("Observation.code", &other, false, core, &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, Error::ValueConflict { .. }));
    assert_eq!(sd.find_element("Observation.code").unwrap(), &first);
}

#[test]
fn differential_reapplied_to_parent_reproduces_the_profile() {
    let core = test_support::core();
    let parent = test_support::parent("Observation");
    let mut sd = test_support::profile_of("Observation", "round-trip");
    let mut diagnostics = Diagnostics::new();
    let mut rules = vec![
        card("subject", Some(1), None),
        card("interpretation", None, Some(Max::Bounded(1))),
        Rule::Only(OnlyRule {
            path: "value[x]".into(),
            types: vec![OnlyRuleType::new("Quantity"), OnlyRuleType::new("string")],
            source: SourceInfo::default(),
        }),
        Rule::Binding(BindingRule {
            path: "code".into(),
            value_set: "my-vs".into(),
            strength: BindingStrength::Extensible,
            source: SourceInfo::default(),
        }),
        Rule::Assignment(AssignmentRule {
            path: "status".into(),
            value: FshValue::Code(FshCode::new("final")),
            exactly: true,
            source: SourceInfo::default(),
        }),
        Rule::Flag(FlagRule {
            path: "issued".into(),
            flags: Flags {
                must_support: true,
                summary: true,
                ..Default::default()
            },
            source: SourceInfo::default(),
        }),
    ];
    apply_rules(&mut sd, &mut rules, core, &mut diagnostics);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    let diff = sd.differential();
    assert!(diff.len() >= 6);
    for diff_element in &diff {
        let Some(base) = parent.find_element(&diff_element.id) else {
            continue;
        };
        let rebuilt = apply_diff(base, diff_element);
        assert_eq!(&rebuilt, sd.find_element(&diff_element.id).unwrap(), "{}", diff_element.id);
    }
    assert!(diff.iter().all(|e| e.id != "Observation.focus"));
}

#[test]
fn slicing_twice_with_the_same_discriminator_changes_nothing() {
    let mut sd = test_support::profile_of("Observation", "slicing");
    sd.slice_it("Observation.component", pattern_discriminator("code"), false, SlicingRules::Open)
        .unwrap();
    let once = sd.find_element("Observation.component").unwrap().slicing.clone();
    sd.slice_it("Observation.component", pattern_discriminator("code"), false, SlicingRules::Open)
        .unwrap();
    assert_eq!(sd.find_element("Observation.component").unwrap().slicing, once);
    assert_eq!(once.unwrap().discriminators().len(), 1);
}

#[test]
fn slice_minimums_may_not_exceed_the_sliced_max() {
    let mut sd = test_support::profile_of("Observation", "slice-sum");
    let mut diagnostics = Diagnostics::new();
    sd.constrain_cardinality("Observation.component", None, Some(Max::Bounded(3)), &mut diagnostics)
        .unwrap();
    sd.slice_it("Observation.component", pattern_discriminator("code"), false, SlicingRules::Open)
        .unwrap();
    for name in ["a", "b", "c"] {
        sd.add_slice("Observation.component", name, None).unwrap();
    }

    sd.constrain_cardinality("Observation.component:a", Some(1), None, &mut diagnostics)
        .unwrap();
    sd.constrain_cardinality("Observation.component:b", Some(1), None, &mut diagnostics)
        .unwrap();
    let err = sd
        .constrain_cardinality("Observation.component:c", Some(2), None, &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, Error::SliceMinExceedsSlicedMax { sum: 4, .. }));
    assert_eq!(sd.find_element("Observation.component:c").unwrap().min, Some(0));
}

#[test]
fn exported_resource_carries_snapshot_and_differential() {
    let core = test_support::core();
    let mut sd = test_support::profile_of("Observation", "exported");
    let mut diagnostics = Diagnostics::new();
    apply_rules(&mut sd, &mut [card("subject", Some(1), None)], core, &mut diagnostics);

    let resource = sd.to_resource().unwrap();
    assert_eq!(resource["resourceType"], "StructureDefinition");
    assert_eq!(resource["derivation"], "constraint");
    assert_eq!(
        resource["baseDefinition"],
        "http://hl7.org/fhir/StructureDefinition/Observation"
    );
    assert_eq!(
        resource["differential"]["element"],
        json!([{ "id": "Observation.subject", "path": "Observation.subject", "min": 1 }])
    );
    assert!(resource["snapshot"]["element"].as_array().unwrap().len() > 10);
}
