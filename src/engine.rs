use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{AccountCache, CacheEntry, hash_config, rebuild_trees};
use crate::config::SchemaValidator;
use crate::hook::{RandomSource, ThreadRandom, handle_processed_auction_request};
use crate::settings::ModuleSettings;
use crate::types::{ConfigError, HookResult, RequestWrapper};

/// The rules engine as a host sees it: one instance per process, called once
/// per auction request.
///
/// Keeps a compiled entry per account and rebuilds it when the account's
/// configuration changes or its refresh interval elapses.
#[derive(Debug)]
pub struct RulesEngine<R = ThreadRandom> {
    cache: AccountCache,
    /// Account to the hash of its last configuration that failed to build.
    rejected: Mutex<HashMap<String, String>>,
    validator: SchemaValidator,
    settings: ModuleSettings,
    rng: R,
}

impl RulesEngine<ThreadRandom> {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded configuration schema fails to
    /// compile.
    pub fn new(settings: ModuleSettings) -> Result<Self, ConfigError> {
        Self::with_rng(settings, ThreadRandom)
    }
}

impl<R: RandomSource> RulesEngine<R> {
    /// # Errors
    ///
    /// See [`RulesEngine::new`].
    pub fn with_rng(settings: ModuleSettings, rng: R) -> Result<Self, ConfigError> {
        Ok(Self {
            cache: AccountCache::new(),
            rejected: Mutex::new(HashMap::new()),
            validator: SchemaValidator::rules_engine()?,
            settings,
            rng,
        })
    }

    #[must_use]
    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    #[must_use]
    pub fn settings(&self) -> &ModuleSettings {
        &self.settings
    }

    /// The entry to serve `account` with, rebuilding it from `raw` first if
    /// needed.
    ///
    /// Returns `None` when the account has no configuration. A configuration
    /// that fails to validate or compile leaves the previous entry in place
    /// and is not retried until it changes. While another caller is rebuilding the account, the previous entry is
    /// served; without one, an entry is built for this call only.
    pub fn refresh(&self, account: &str, raw: &[u8], now: Instant) -> Option<Arc<CacheEntry>> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let current = self.cache.get(account);
        if !rebuild_trees(
            current.as_deref(),
            raw,
            self.settings.refresh_interval(),
            now,
        ) {
            return current;
        }

        let hash = hash_config(raw);
        if self.rejected.lock().get(account) == Some(&hash) {
            return current;
        }

        let guard = self.cache.begin_rebuild(account);
        if guard.is_none() {
            if current.is_some() {
                debug!(account, "rebuild already in progress, serving previous entry");
                return current;
            }
            debug!(account, "rebuild already in progress, building unpublished entry");
        }

        match CacheEntry::new(raw, &self.validator, &self.settings.geoscopes, now) {
            Ok(entry) => {
                self.rejected.lock().remove(account);
                let entry = Arc::new(entry);
                if guard.is_some() {
                    info!(
                        account,
                        hash = %entry.hashed_config,
                        rule_sets = entry.rule_sets.len(),
                        "rebuilt rules engine trees"
                    );
                    self.cache.set(account, Arc::clone(&entry));
                }
                Some(entry)
            }
            Err(error) => {
                warn!(account, %error, "rejected rules engine configuration, keeping previous entry");
                self.rejected.lock().insert(account.to_owned(), hash);
                current
            }
        }
    }

    /// Run the processed-auction-request rule sets of `account` against
    /// `wrapper`.
    ///
    /// Yields an empty result when the account has no usable configuration
    /// or its configuration is disabled.
    pub fn handle_processed_auction_request(
        &self,
        account: &str,
        raw_config: &[u8],
        wrapper: &RequestWrapper,
    ) -> HookResult {
        match self.refresh(account, raw_config, Instant::now()) {
            Some(entry) if entry.enabled => {
                handle_processed_auction_request(&entry.rule_sets, wrapper, &self.rng)
            }
            Some(_) => {
                debug!(account, "rules engine disabled for account");
                HookResult::new()
            }
            None => HookResult::new(),
        }
    }
}
