use thiserror::Error;

/// Errors raised while loading and validating a rules engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("empty rules engine configuration")]
    Empty,

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON schema validation: {}", format_violations(.violations))]
    Schema { violations: Vec<String> },

    #[error("invalid JSON schema document: {0}")]
    SchemaDocument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("rule set {index} is invalid: {source}")]
    InvalidRuleSet {
        index: usize,
        #[source]
        source: RuleSetError,
    },
}

fn format_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("[{v}]"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Structural problems within a single rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    #[error("model group {model_group} has schema functions but no rules")]
    SchemaWithoutRules { model_group: usize },

    #[error("model group {model_group} has no schema functions to test its rules against")]
    RulesWithoutSchema { model_group: usize },

    #[error(
        "model group {model_group} number of schema functions ({schema}) differs from number of conditions ({conditions}) of rule {rule}"
    )]
    ConditionCountMismatch {
        model_group: usize,
        rule: usize,
        schema: usize,
        conditions: usize,
    },
}

/// Errors raised while compiling configuration into a tree.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("schema function {name} was not created: unknown function")]
    UnknownSchemaFunction { name: String },

    #[error("result function {name} was not created: unknown function")]
    UnknownResultFunction { name: String },

    #[error("invalid arguments for function {name}: {reason}")]
    InvalidArgs { name: String, reason: String },

    #[error("rule {rule} has a condition at level {level} but no schema function is declared for it")]
    MissingSchemaFunction { rule: usize, level: usize },

    #[error("unknown geoscope type: {directive}")]
    UnknownGeoscope { directive: String },

    #[error("model group {model_group} of rule set '{rule_set}': {source}")]
    ModelGroup {
        rule_set: String,
        model_group: usize,
        #[source]
        source: Box<BuildError>,
    },
}

/// Failure of a schema or result function at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    #[error("{0} is not present in request")]
    MissingField(&'static str),

    #[error("imp {imp}: {path} {reason}")]
    InvalidImpExt {
        imp: String,
        path: &'static str,
        reason: String,
    },

    #[error("device type {0} was not found")]
    UnknownDeviceType(i32),
}

/// Failure of a whole tree evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree root is nil")]
    NilRoot,

    #[error("schema function {name} failed: {source}")]
    SchemaFunction {
        name: &'static str,
        #[source]
        source: FunctionError,
    },

    #[error("{}", format_result_failures(.0))]
    ResultFunctions(Vec<ResultFunctionFailure>),
}

/// One failing result function recorded during tree evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFunctionFailure {
    pub name: &'static str,
    pub error: FunctionError,
}

fn format_result_failures(failures: &[ResultFunctionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("result function {} failed: {}", f.name, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by hook orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("no model groups available")]
    NoModelGroups,
}
