mod cache;
mod compile;
mod config;
mod engine;
mod error;
mod evaluate;
pub mod functions;
mod hook;
mod parse;
mod settings;
mod types;

pub use cache::{
    AccountCache, CacheEntry, CacheModelGroup, CacheRuleSet, DYNAMIC_RULE_SET_NAME, RebuildGuard,
    RequestTree, hash_config, rebuild_trees,
};
pub use compile::{
    CountryExclusions, CountryGroups, EEA_COUNTRIES, GeoscopeTreeBuilder, ParsedGeoscopes, Policy,
    TreeBuild, TreeBuilder, default_country_groups, merge_country_groups,
};
pub use config::{
    DEFAULT_WEIGHT, FunctionDecl, ModelGroup, RuleDecl, RuleSet, RulesEngineConfig,
    SchemaValidator, SetDefinitions, Stage, validate_rule_set,
};
pub use engine::RulesEngine;
pub use error::RulesEngineError;
pub use hook::{RandomSource, ThreadRandom, handle_processed_auction_request, select_model_group};
pub use parse::{Directive, ParseError, parse_directive};
pub use settings::ModuleSettings;
pub use types::{
    AnalyticsTag, App, BidRequest, BuildError, Channel, ChangeSet, ConfigError, Content, Device,
    Dooh, Eid, ExtPrebid, FunctionError, Geo, HookError, HookResult, IMP_BIDDERS_PATH, Imp,
    ImpBidders, Mutation, MutationKind, MutationPayload, Node, Regs, RequestExt, RequestWrapper,
    ResultFunction, ResultFunctionFailure, ResultFunctionMeta, RuleSetError, SchemaFunction,
    SeatNonBid, Site, Tree, TreeError, User, WILDCARD,
};
