use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::SchemaValidator;
use crate::types::{ConfigError, RuleSetError};

/// Weight given to a model group that does not declare one.
pub const DEFAULT_WEIGHT: u32 = 100;

/// An account's rules engine configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesEngineConfig {
    pub enabled: bool,
    #[serde(default)]
    pub generate_rules_from_bidderconfig: bool,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub set_definitions: SetDefinitions,
    pub rulesets: Vec<RuleSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefinitions {
    /// Group name to member country codes.
    #[serde(default)]
    pub country_groups: BTreeMap<String, Vec<String>>,
}

/// Hook point a rule set applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Entrypoint,
    RawAuctionRequest,
    ProcessedAuctionRequest,
    BidderRequest,
    RawBidderResponse,
    AllProcessedBidResponses,
    AuctionResponse,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entrypoint => "entrypoint",
            Self::RawAuctionRequest => "raw_auction_request",
            Self::ProcessedAuctionRequest => "processed_auction_request",
            Self::BidderRequest => "bidder_request",
            Self::RawBidderResponse => "raw_bidder_response",
            Self::AllProcessedBidResponses => "all_processed_bid_responses",
            Self::AuctionResponse => "auction_response",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub stage: Stage,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "modelgroups")]
    pub model_groups: Vec<ModelGroup>,
}

/// One competing decision tree of a rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelGroup {
    /// 1 to 100; absent or zero reads as [`DEFAULT_WEIGHT`] after validation.
    #[serde(default)]
    pub weight: u32,
    #[serde(default, rename = "analyticsKey")]
    pub analytics_key: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub schema: Vec<FunctionDecl>,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
    #[serde(default)]
    pub default: Vec<FunctionDecl>,
}

/// A function named in configuration together with its raw arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl FunctionDecl {
    #[must_use]
    pub fn new(function: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// A path of condition values, one per schema function, and what to do when
/// a request follows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDecl {
    pub conditions: Vec<String>,
    #[serde(default)]
    pub results: Vec<FunctionDecl>,
}

impl RulesEngineConfig {
    /// Validate and deserialize a raw configuration document.
    ///
    /// Runs the JSON Schema check first, then the structural checks of
    /// [`validate_rule_set`] on every rule set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty input, malformed JSON, schema
    /// violations or the first invalid rule set.
    pub fn parse(raw: &[u8], validator: &SchemaValidator) -> Result<Self, ConfigError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::Empty);
        }
        let document: Value = serde_json::from_slice(raw)?;
        validator.validate(&document)?;

        let mut config: Self = serde_json::from_value(document)?;
        for (index, rule_set) in config.rulesets.iter_mut().enumerate() {
            validate_rule_set(rule_set)
                .map_err(|source| ConfigError::InvalidRuleSet { index, source })?;
        }
        Ok(config)
    }

    /// Read and parse a configuration document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`parse`](Self::parse).
    pub fn from_path(
        path: impl AsRef<Path>,
        validator: &SchemaValidator,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path)?;
        Self::parse(&raw, validator)
    }

    /// Rule sets attached to `stage`, in declaration order.
    pub fn rule_sets_for(&self, stage: Stage) -> impl Iterator<Item = &RuleSet> {
        self.rulesets.iter().filter(move |rs| rs.stage == stage)
    }
}

/// Default missing weights and check that every model group's rules line up
/// with its schema.
///
/// # Errors
///
/// Returns the first [`RuleSetError`] found, naming the model group and rule
/// index.
pub fn validate_rule_set(rule_set: &mut RuleSet) -> Result<(), RuleSetError> {
    for (model_group, group) in rule_set.model_groups.iter_mut().enumerate() {
        if group.weight == 0 {
            group.weight = DEFAULT_WEIGHT;
        }
        if !group.schema.is_empty() && group.rules.is_empty() {
            return Err(RuleSetError::SchemaWithoutRules { model_group });
        }
        if group.schema.is_empty() && !group.rules.is_empty() {
            return Err(RuleSetError::RulesWithoutSchema { model_group });
        }
        for (rule, decl) in group.rules.iter().enumerate() {
            if decl.conditions.len() != group.schema.len() {
                return Err(RuleSetError::ConditionCountMismatch {
                    model_group,
                    rule,
                    schema: group.schema.len(),
                    conditions: decl.conditions.len(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::rules_engine().unwrap()
    }

    fn rule_set(groups: Vec<ModelGroup>) -> RuleSet {
        RuleSet {
            stage: Stage::ProcessedAuctionRequest,
            name: "rs".into(),
            version: String::new(),
            model_groups: groups,
        }
    }

    fn schema(names: &[&str]) -> Vec<FunctionDecl> {
        names.iter().map(|n| FunctionDecl::new(*n, None)).collect()
    }

    fn rule(conditions: &[&str]) -> RuleDecl {
        RuleDecl {
            conditions: conditions.iter().map(|c| (*c).to_owned()).collect(),
            results: Vec::new(),
        }
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            RulesEngineConfig::parse(b"", &validator()),
            Err(ConfigError::Empty)
        ));
        assert!(matches!(
            RulesEngineConfig::parse(b"  \n", &validator()),
            Err(ConfigError::Empty)
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = RulesEngineConfig::parse(b"malformed", &validator()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("malformed JSON: "));
    }

    #[test]
    fn empty_object_fails_schema() {
        let err = RulesEngineConfig::parse(b"{}", &validator()).unwrap_err();
        assert!(err.to_string().starts_with("JSON schema validation: [(root): "));
    }

    #[test]
    fn no_schema_no_rules_is_valid() {
        let mut rs = rule_set(vec![ModelGroup::default()]);
        assert_eq!(validate_rule_set(&mut rs), Ok(()));
        assert_eq!(rs.model_groups[0].weight, DEFAULT_WEIGHT);
    }

    #[test]
    fn explicit_weight_kept() {
        let mut rs = rule_set(vec![ModelGroup {
            weight: 7,
            ..ModelGroup::default()
        }]);
        validate_rule_set(&mut rs).unwrap();
        assert_eq!(rs.model_groups[0].weight, 7);
    }

    #[test]
    fn schema_without_rules() {
        let mut rs = rule_set(vec![ModelGroup {
            schema: schema(&["channel"]),
            ..ModelGroup::default()
        }]);
        assert_eq!(
            validate_rule_set(&mut rs),
            Err(RuleSetError::SchemaWithoutRules { model_group: 0 })
        );
    }

    #[test]
    fn rules_without_schema() {
        let mut rs = rule_set(vec![ModelGroup {
            rules: vec![rule(&[])],
            ..ModelGroup::default()
        }]);
        assert_eq!(
            validate_rule_set(&mut rs),
            Err(RuleSetError::RulesWithoutSchema { model_group: 0 })
        );
    }

    #[test]
    fn condition_count_mismatch_names_group_and_rule() {
        let mut rs = rule_set(vec![
            ModelGroup {
                schema: schema(&["channel"]),
                rules: vec![rule(&["amp"])],
                ..ModelGroup::default()
            },
            ModelGroup {
                schema: schema(&["channel", "deviceCountry"]),
                rules: vec![rule(&["amp", "USA"]), rule(&["web"])],
                ..ModelGroup::default()
            },
        ]);
        let err = validate_rule_set(&mut rs).unwrap_err();
        assert_eq!(
            err,
            RuleSetError::ConditionCountMismatch {
                model_group: 1,
                rule: 1,
                schema: 2,
                conditions: 1
            }
        );
    }

    #[test]
    fn parse_reports_rule_set_index() {
        let raw = json!({
            "enabled": true,
            "rulesets": [{
                "stage": "processed_auction_request",
                "name": "n",
                "modelgroups": [{
                    "schema": [{"function": "channel"}, {"function": "deviceCountry"}],
                    "rules": [{"conditions": ["amp"], "results": []}]
                }]
            }]
        });
        let err = RulesEngineConfig::parse(raw.to_string().as_bytes(), &validator()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "rule set 0 is invalid: model group 0 number of schema functions (2) differs from number of conditions (1) of rule 0"
        );
    }

    #[test]
    fn parse_full_document() {
        let raw = json!({
            "enabled": true,
            "generate_rules_from_bidderconfig": true,
            "set_definitions": {"country_groups": {"CUSTOM_GROUP": ["USA", "CAN"]}},
            "timestamp": "20250131 00:00:00",
            "rulesets": [{
                "stage": "processed_auction_request",
                "name": "exclude-in-jpn",
                "version": "1234",
                "modelgroups": [{
                    "weight": 100,
                    "analyticsKey": "experiment-name",
                    "version": "4567",
                    "schema": [
                        {"function": "deviceCountryIn", "args": {"countries": ["USA"]}},
                        {"function": "channel"}
                    ],
                    "default": [],
                    "rules": [{
                        "conditions": ["true", "amp"],
                        "results": [{"function": "excludeBidders", "args": {"bidders": ["bidderA"], "seatNonBid": 111}}]
                    }]
                }, {
                    "analyticsKey": "experiment-name",
                    "version": "3.0",
                    "schema": [{"function": "channel"}],
                    "rules": [{"conditions": ["*"], "results": []}]
                }]
            }]
        });
        let config = RulesEngineConfig::parse(raw.to_string().as_bytes(), &validator()).unwrap();

        assert!(config.enabled);
        assert!(config.generate_rules_from_bidderconfig);
        assert_eq!(config.set_definitions.country_groups["CUSTOM_GROUP"], vec!["USA", "CAN"]);
        let rs = &config.rulesets[0];
        assert_eq!(rs.stage, Stage::ProcessedAuctionRequest);
        assert_eq!(rs.model_groups.len(), 2);
        assert_eq!(rs.model_groups[1].weight, DEFAULT_WEIGHT);
        assert_eq!(rs.model_groups[0].schema[0].args, Some(json!({"countries": ["USA"]})));
        assert_eq!(rs.model_groups[0].schema[1].args, None);
        assert_eq!(config.rule_sets_for(Stage::ProcessedAuctionRequest).count(), 1);
        assert_eq!(config.rule_sets_for(Stage::Entrypoint).count(), 0);
    }

    #[test]
    fn stage_wire_names() {
        let stage: Stage = serde_json::from_value(json!("all_processed_bid_responses")).unwrap();
        assert_eq!(stage, Stage::AllProcessedBidResponses);
        assert_eq!(stage.to_string(), "all_processed_bid_responses");
    }
}
