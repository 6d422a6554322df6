use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::request::BidRequest;

/// Impression id to the bidders (and their params) that impression keeps.
pub type ImpBidders = BTreeMap<String, Map<String, Value>>;

/// Path of the bidder map inside a bid request.
pub const IMP_BIDDERS_PATH: [&str; 5] = ["bidrequest", "imp", "ext", "prebid", "bidder"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPayload {
    ImpBidders(ImpBidders),
}

/// A recorded intent to change the request. The engine never applies these
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation {
    pub kind: MutationKind,
    pub path: Vec<String>,
    pub payload: MutationPayload,
}

impl Mutation {
    /// Replace the bidder map of each listed impression.
    #[must_use]
    pub fn update_imp_bidders(bidders: ImpBidders) -> Self {
        Self {
            kind: MutationKind::Update,
            path: IMP_BIDDERS_PATH.iter().map(|s| (*s).to_owned()).collect(),
            payload: MutationPayload::ImpBidders(bidders),
        }
    }

    /// Remove the listed bidders from each listed impression.
    #[must_use]
    pub fn delete_imp_bidders(bidders: ImpBidders) -> Self {
        Self {
            kind: MutationKind::Delete,
            ..Self::update_imp_bidders(bidders)
        }
    }

    fn apply(&self, request: &mut BidRequest) {
        let MutationPayload::ImpBidders(per_imp) = &self.payload;
        for imp in &mut request.imp {
            let Some(bidders) = per_imp.get(&imp.id) else {
                continue;
            };
            let ext = imp.ext.get_or_insert_with(|| Value::Object(Map::new()));
            let Some(target) = imp_bidder_map(ext) else {
                continue;
            };
            match self.kind {
                MutationKind::Update => *target = bidders.clone(),
                MutationKind::Delete => {
                    for name in bidders.keys() {
                        target.remove(name);
                    }
                }
            }
        }
    }
}

fn imp_bidder_map(ext: &mut Value) -> Option<&mut Map<String, Value>> {
    let prebid = object_entry(ext, "prebid")?;
    let bidder = object_entry(prebid, "bidder")?;
    ensure_object(bidder)
}

fn object_entry<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    Some(
        ensure_object(value)?
            .entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new())),
    )
}

fn ensure_object(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

/// Ordered list of mutations produced by one hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Apply every mutation to `request`, in the order they were recorded.
    pub fn apply(&self, request: &mut BidRequest) {
        for mutation in &self.mutations {
            mutation.apply(request);
        }
    }
}

/// An analytics record emitted by a result function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsTag {
    pub analytics_key: String,
    pub analytics_value: String,
    pub model_version: String,
    pub rule_fired: String,
    pub result_function: String,
}

/// A bidder removed from an impression, reported with the configured
/// non-bid status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatNonBid {
    pub imp_id: String,
    pub seat: String,
    pub code: i32,
}

/// Everything one hook invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HookResult {
    pub change_set: ChangeSet,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub analytics_tags: Vec<AnalyticsTag>,
    pub seat_non_bids: Vec<SeatNonBid>,
}

impl HookResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing at all was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_set.is_empty()
            && self.errors.is_empty()
            && self.warnings.is_empty()
            && self.analytics_tags.is_empty()
            && self.seat_non_bids.is_empty()
    }
}
