mod model;
mod validate;

pub use model::{
    DEFAULT_WEIGHT, FunctionDecl, ModelGroup, RuleDecl, RuleSet, RulesEngineConfig, SetDefinitions,
    Stage, validate_rule_set,
};
pub use validate::SchemaValidator;
