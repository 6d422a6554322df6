use bidrules::{ConfigError, RuleSetError, RulesEngineConfig, SchemaValidator, Stage};
use serde_json::{json, Value};

fn parse(doc: &Value) -> Result<RulesEngineConfig, ConfigError> {
    let validator = SchemaValidator::rules_engine().unwrap();
    RulesEngineConfig::parse(doc.to_string().as_bytes(), &validator)
}

fn with_groups(groups: Value) -> Value {
    json!({
        "enabled": true,
        "rulesets": [{
            "stage": "processed_auction_request",
            "name": "rs",
            "modelgroups": groups
        }]
    })
}

#[test]
fn full_document_round_trips_into_types() {
    let config = parse(&json!({
        "enabled": true,
        "generate_rules_from_bidderconfig": true,
        "timestamp": "20250131 00:00:00",
        "set_definitions": {"country_groups": {"NORDICS": ["DNK", "FIN", "NOR", "SWE"]}},
        "rulesets": [
            {
                "stage": "processed_auction_request",
                "name": "exclude-in-jpn",
                "version": "1234",
                "modelgroups": [{
                    "weight": 98,
                    "analyticsKey": "experiment-name",
                    "version": "4567",
                    "schema": [
                        {"function": "deviceCountryIn", "args": {"countries": ["JPN"]}},
                        {"function": "dataCenter"}
                    ],
                    "rules": [{
                        "conditions": ["true", "us-east"],
                        "results": [{"function": "excludeBidders", "args": {"bidders": ["bidderA"], "seatNonBid": 111}}]
                    }],
                    "default": [{"function": "logATag", "args": {"analyticsValue": "default-allow"}}]
                }, {
                    "analyticsKey": "experiment-name-2"
                }]
            },
            {"stage": "entrypoint", "name": "other", "modelgroups": [{}]}
        ]
    }))
    .unwrap();

    assert!(config.enabled);
    assert!(config.generate_rules_from_bidderconfig);
    assert_eq!(config.set_definitions.country_groups["NORDICS"].len(), 4);
    assert_eq!(config.rulesets.len(), 2);

    let groups = &config.rulesets[0].model_groups;
    assert_eq!(groups[0].weight, 98);
    assert_eq!(groups[0].schema[1].function, "dataCenter");
    assert!(groups[0].schema[1].args.is_none());
    assert_eq!(groups[0].rules[0].conditions, vec!["true", "us-east"]);
    assert_eq!(groups[1].weight, 100);

    let stages: Vec<&str> = config
        .rule_sets_for(Stage::ProcessedAuctionRequest)
        .map(|rs| rs.name.as_str())
        .collect();
    assert_eq!(stages, vec!["exclude-in-jpn"]);
}

#[test]
fn rule_with_too_few_conditions_names_group_and_rule() {
    let err = parse(&with_groups(json!([
        {"schema": [{"function": "channel"}], "rules": [{"conditions": ["amp"], "results": []}]},
        {
            "schema": [{"function": "channel"}, {"function": "deviceCountry"}],
            "rules": [
                {"conditions": ["amp", "USA"], "results": []},
                {"conditions": ["web"], "results": []}
            ]
        }
    ])))
    .unwrap_err();

    match &err {
        ConfigError::InvalidRuleSet { index, source } => {
            assert_eq!(*index, 0);
            assert_eq!(
                *source,
                RuleSetError::ConditionCountMismatch {
                    model_group: 1,
                    rule: 1,
                    schema: 2,
                    conditions: 1,
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "rule set 0 is invalid: model group 1 number of schema functions (2) differs from number of conditions (1) of rule 1"
    );
}

#[test]
fn schema_and_rules_must_come_together() {
    let err = parse(&with_groups(json!([{"schema": [{"function": "channel"}]}]))).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidRuleSet {
            source: RuleSetError::SchemaWithoutRules { model_group: 0 },
            ..
        }
    ));

    let err = parse(&with_groups(json!([
        {"rules": [{"conditions": ["amp"], "results": []}]}
    ])))
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidRuleSet {
            source: RuleSetError::RulesWithoutSchema { model_group: 0 },
            ..
        }
    ));
}

#[test]
fn schema_violations_are_reported_together() {
    let err = parse(&json!({
        "enabled": "yes",
        "rulesets": [{
            "stage": "somewhere",
            "name": "rs",
            "modelgroups": [{"weight": 101, "schema": [{"function": "notAFunction"}]}]
        }]
    }))
    .unwrap_err();

    let ConfigError::Schema { violations } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(violations.iter().any(|v| v.starts_with("enabled: ")));
    assert!(violations.iter().any(|v| v.starts_with("rulesets.0.stage: ")));
    assert!(violations.iter().any(|v| v.starts_with("rulesets.0.modelgroups.0.weight: ")));
    assert!(violations
        .iter()
        .any(|v| v.starts_with("rulesets.0.modelgroups.0.schema.0.function: ")));
    assert!(err.to_string().starts_with("JSON schema validation: ["));
}

#[test]
fn missing_required_fields() {
    let err = parse(&json!({})).unwrap_err();
    let ConfigError::Schema { violations } = err else {
        panic!("expected schema violations");
    };
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| v.starts_with("(root): ")));
}

#[test]
fn empty_model_group_list_rejected() {
    let err = parse(&with_groups(json!([]))).unwrap_err();
    assert!(matches!(err, ConfigError::Schema { .. }));
}

#[test]
fn unknown_result_function_rejected_by_schema() {
    let err = parse(&with_groups(json!([
        {"default": [{"function": "unknownResultFunction"}]}
    ])))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Schema { .. }));
}

#[test]
fn empty_and_malformed_input() {
    let validator = SchemaValidator::rules_engine().unwrap();
    assert!(matches!(
        RulesEngineConfig::parse(b"", &validator),
        Err(ConfigError::Empty)
    ));
    assert!(matches!(
        RulesEngineConfig::parse(b"{\"enabled\": tru", &validator),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn custom_schema_document() {
    let validator = SchemaValidator::from_value(&json!({
        "type": "object",
        "required": ["enabled", "rulesets"]
    }))
    .unwrap();
    let config =
        RulesEngineConfig::parse(br#"{"enabled": false, "rulesets": []}"#, &validator).unwrap();
    assert!(!config.enabled);

    assert!(matches!(
        SchemaValidator::from_value(&json!({"type": 12})),
        Err(ConfigError::SchemaDocument(_))
    ));
}
