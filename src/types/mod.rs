mod change_set;
mod error;
mod request;
mod tree;

pub use change_set::{
    AnalyticsTag, ChangeSet, HookResult, IMP_BIDDERS_PATH, ImpBidders, Mutation, MutationKind,
    MutationPayload, SeatNonBid,
};
pub use error::{
    BuildError, ConfigError, FunctionError, HookError, ResultFunctionFailure, RuleSetError,
    TreeError,
};
pub use request::{
    App, BidRequest, Channel, Content, Device, Dooh, Eid, ExtPrebid, Geo, Imp, Regs, RequestExt,
    RequestWrapper, Site, User,
};
pub use tree::{Node, ResultFunction, ResultFunctionMeta, SchemaFunction, Tree, WILDCARD};
