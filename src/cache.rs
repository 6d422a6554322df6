//! Per-account compiled trees and the rules for when to rebuild them.
//!
//! Readers take a snapshot of the account map with a single atomic load and
//! never block. Writers publish a whole new map; an entry is never changed
//! after it has been published.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::compile::{GeoscopeTreeBuilder, TreeBuild, TreeBuilder};
use crate::config::{
    DEFAULT_WEIGHT, ModelGroup, RuleSet, RulesEngineConfig, SchemaValidator, Stage,
};
use crate::error::RulesEngineError;
use crate::functions::{new_request_schema_function, new_result_function};
use crate::types::{BuildError, HookResult, RequestWrapper, Tree};

/// Name of the rule set generated from bidder geoscopes.
pub const DYNAMIC_RULE_SET_NAME: &str = "bidder_config_geoscopes";

/// A tree over bid requests producing hook results.
pub type RequestTree = Tree<RequestWrapper, HookResult>;

/// Hex-encoded SHA-256 of a raw configuration. Empty input hashes to `""`.
#[must_use]
pub fn hash_config(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(raw))
}

/// Whether the cached `entry` must be rebuilt for the configuration `raw`.
///
/// True when there is no entry, when the configuration hash changed, or when
/// the entry is older than `refresh_interval`. A zero interval disables the
/// age check.
#[must_use]
pub fn rebuild_trees(
    entry: Option<&CacheEntry>,
    raw: &[u8],
    refresh_interval: Duration,
    now: Instant,
) -> bool {
    let Some(entry) = entry else {
        return true;
    };
    if entry.hashed_config != hash_config(raw) {
        return true;
    }
    !refresh_interval.is_zero() && entry.age(now) > refresh_interval
}

/// A compiled model group ready to be selected and run.
#[derive(Debug, Clone)]
pub struct CacheModelGroup {
    pub weight: u32,
    pub analytics_key: String,
    pub version: String,
    pub tree: Arc<RequestTree>,
}

#[derive(Debug, Clone)]
pub struct CacheRuleSet {
    pub name: String,
    pub version: String,
    pub model_groups: Vec<CacheModelGroup>,
}

/// Everything compiled from one version of an account's configuration.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub timestamp: Instant,
    pub hashed_config: String,
    pub enabled: bool,
    pub rule_sets: Vec<CacheRuleSet>,
}

impl CacheEntry {
    /// Validate `raw` and compile every processed-auction-request rule set.
    ///
    /// When the configuration asks for it, a rule set generated from
    /// `geoscopes` is appended after the declared ones.
    ///
    /// # Errors
    ///
    /// Returns [`RulesEngineError::Config`] if the document is rejected and
    /// [`RulesEngineError::Build`] if any tree fails to compile. No partial
    /// entry is ever produced.
    pub fn new(
        raw: &[u8],
        validator: &SchemaValidator,
        geoscopes: &BTreeMap<String, Vec<String>>,
        now: Instant,
    ) -> Result<Self, RulesEngineError> {
        let config = RulesEngineConfig::parse(raw, validator)?;

        let mut rule_sets = Vec::new();
        for rule_set in &config.rulesets {
            if rule_set.stage != Stage::ProcessedAuctionRequest {
                debug!(
                    rule_set = %rule_set.name,
                    stage = %rule_set.stage,
                    "skipping rule set for unsupported stage"
                );
                continue;
            }
            rule_sets.push(compile_rule_set(rule_set)?);
        }

        if config.generate_rules_from_bidderconfig {
            let builder =
                GeoscopeTreeBuilder::new(geoscopes.clone(), &config.set_definitions.country_groups);
            rule_sets.push(CacheRuleSet {
                name: DYNAMIC_RULE_SET_NAME.to_owned(),
                version: config.timestamp.clone(),
                model_groups: vec![CacheModelGroup {
                    weight: DEFAULT_WEIGHT,
                    analytics_key: String::new(),
                    version: String::new(),
                    tree: Arc::new(builder.build_tree()?),
                }],
            });
        }

        Ok(Self {
            timestamp: now,
            hashed_config: hash_config(raw),
            enabled: config.enabled,
            rule_sets,
        })
    }

    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

fn compile_rule_set(rule_set: &RuleSet) -> Result<CacheRuleSet, BuildError> {
    let model_groups = rule_set
        .model_groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            compile_model_group(group).map_err(|source| BuildError::ModelGroup {
                rule_set: rule_set.name.clone(),
                model_group: index,
                source: Box::new(source),
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(CacheRuleSet {
        name: rule_set.name.clone(),
        version: rule_set.version.clone(),
        model_groups,
    })
}

fn compile_model_group(group: &ModelGroup) -> Result<CacheModelGroup, BuildError> {
    let tree = TreeBuilder::new(group, new_request_schema_function, new_result_function)
        .build_tree()?;
    Ok(CacheModelGroup {
        weight: group.weight,
        analytics_key: group.analytics_key.clone(),
        version: group.version.clone(),
        tree: Arc::new(tree),
    })
}

/// Compiled entries keyed by account id.
#[derive(Default)]
pub struct AccountCache {
    entries: ArcSwap<HashMap<String, Arc<CacheEntry>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl AccountCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current entry for `account`, if any. Never blocks.
    #[must_use]
    pub fn get(&self, account: &str) -> Option<Arc<CacheEntry>> {
        self.entries.load().get(account).cloned()
    }

    /// Publish `entry` for `account`, replacing any previous one.
    pub fn set(&self, account: &str, entry: Arc<CacheEntry>) {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(account.to_owned(), Arc::clone(&entry));
            next
        });
    }

    /// Remove `account`, returning whether it was present.
    pub fn delete(&self, account: &str) -> bool {
        let previous = self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(account);
            next
        });
        previous.contains_key(account)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Claim the right to rebuild `account`.
    ///
    /// Returns `None` while another caller holds the claim. The claim is
    /// released when the guard is dropped.
    #[must_use]
    pub fn begin_rebuild(&self, account: &str) -> Option<RebuildGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(account.to_owned()) {
            return None;
        }
        Some(RebuildGuard {
            cache: self,
            account: account.to_owned(),
        })
    }
}

impl fmt::Debug for AccountCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCache")
            .field("accounts", &self.len())
            .field("rebuilding", &self.in_flight.lock().len())
            .finish()
    }
}

/// Exclusive claim on rebuilding one account; see [`AccountCache::begin_rebuild`].
#[derive(Debug)]
pub struct RebuildGuard<'a> {
    cache: &'a AccountCache,
    account: String,
}

impl RebuildGuard<'_> {
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.cache.in_flight.lock().remove(&self.account);
    }
}
