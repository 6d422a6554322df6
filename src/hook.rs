//! Running an account's compiled rule sets against one auction request.

use rand::Rng;
use tracing::debug;

use crate::cache::{CacheModelGroup, CacheRuleSet};
use crate::types::{HookError, HookResult, RequestWrapper, ResultFunctionMeta};

/// Source of uniform random integers, injectable for tests.
pub trait RandomSource: Send + Sync {
    /// A uniformly distributed value in `0..n`. Returns 0 when `n` is 0.
    fn intn(&self, n: u32) -> u32;
}

/// [`RandomSource`] backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn intn(&self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..n)
    }
}

/// Pick one model group, with probability proportional to its weight.
///
/// Weights are laid end to end over `1..=sum`; a draw of `rng.intn(sum) + 1`
/// selects the group whose range contains it. The sum saturates at
/// `u32::MAX`.
///
/// # Errors
///
/// Returns [`HookError::NoModelGroups`] if `groups` is empty.
pub fn select_model_group<'a>(
    groups: &'a [CacheModelGroup],
    rng: &dyn RandomSource,
) -> Result<&'a CacheModelGroup, HookError> {
    let last = groups.last().ok_or(HookError::NoModelGroups)?;
    let total = groups
        .iter()
        .fold(0_u32, |sum, g| sum.saturating_add(g.weight));
    let pick = rng.intn(total).saturating_add(1);

    let mut cumulative = 0_u32;
    for group in groups {
        cumulative = cumulative.saturating_add(group.weight);
        if cumulative >= pick {
            return Ok(group);
        }
    }
    Ok(last)
}

/// Evaluate every rule set against `wrapper` and merge their output.
///
/// A failing rule set records its error and the remaining rule sets still
/// run.
#[must_use]
pub fn handle_processed_auction_request(
    rule_sets: &[CacheRuleSet],
    wrapper: &RequestWrapper,
    rng: &dyn RandomSource,
) -> HookResult {
    let mut result = HookResult::new();

    for rule_set in rule_sets {
        let group = match select_model_group(&rule_set.model_groups, rng) {
            Ok(group) => group,
            Err(err) => {
                result.errors.push(format!("rule set '{}': {err}", rule_set.name));
                continue;
            }
        };
        debug!(
            rule_set = %rule_set.name,
            analytics_key = %group.analytics_key,
            version = %group.version,
            "running model group"
        );

        let meta = ResultFunctionMeta::new(&group.analytics_key, &group.version);
        if let Err(err) = group.tree.run_with_meta(wrapper, &mut result, meta) {
            result.errors.push(format!("rule set '{}': {err}", rule_set.name));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::RequestTree;

    struct Fixed(u32);

    impl RandomSource for Fixed {
        fn intn(&self, n: u32) -> u32 {
            self.0.min(n.saturating_sub(1))
        }
    }

    fn group(weight: u32, key: &str) -> CacheModelGroup {
        CacheModelGroup {
            weight,
            analytics_key: key.to_owned(),
            version: String::new(),
            tree: Arc::new(RequestTree::new()),
        }
    }

    #[test]
    fn even_split() {
        let groups = [group(50, "a"), group(50, "b")];
        assert_eq!(select_model_group(&groups, &Fixed(25)).unwrap().analytics_key, "a");
        assert_eq!(select_model_group(&groups, &Fixed(75)).unwrap().analytics_key, "b");
    }

    #[test]
    fn range_boundaries() {
        let groups = [group(30, "a"), group(20, "b"), group(50, "c")];
        assert_eq!(select_model_group(&groups, &Fixed(0)).unwrap().analytics_key, "a");
        assert_eq!(select_model_group(&groups, &Fixed(29)).unwrap().analytics_key, "a");
        assert_eq!(select_model_group(&groups, &Fixed(30)).unwrap().analytics_key, "b");
        assert_eq!(select_model_group(&groups, &Fixed(49)).unwrap().analytics_key, "b");
        assert_eq!(select_model_group(&groups, &Fixed(50)).unwrap().analytics_key, "c");
        assert_eq!(select_model_group(&groups, &Fixed(99)).unwrap().analytics_key, "c");
    }

    #[test]
    fn single_group_always_selected() {
        let groups = [group(100, "only")];
        for draw in [0, 50, 99] {
            assert_eq!(
                select_model_group(&groups, &Fixed(draw)).unwrap().analytics_key,
                "only"
            );
        }
    }

    #[test]
    fn huge_weights_saturate() {
        let groups = [group(u32::MAX, "a"), group(u32::MAX, "b"), group(1, "c")];
        assert_eq!(select_model_group(&groups, &Fixed(0)).unwrap().analytics_key, "a");
        assert_eq!(
            select_model_group(&groups, &Fixed(u32::MAX)).unwrap().analytics_key,
            "a"
        );

        let groups = [group(10, "a"), group(u32::MAX - 5, "b")];
        assert_eq!(select_model_group(&groups, &Fixed(9)).unwrap().analytics_key, "a");
        assert_eq!(select_model_group(&groups, &Fixed(10)).unwrap().analytics_key, "b");
        assert_eq!(
            select_model_group(&groups, &Fixed(u32::MAX)).unwrap().analytics_key,
            "b"
        );
    }

    #[test]
    fn empty_groups_rejected() {
        assert_eq!(
            select_model_group(&[], &ThreadRandom).unwrap_err(),
            HookError::NoModelGroups
        );
    }

    #[test]
    fn thread_random_stays_in_range() {
        assert_eq!(ThreadRandom.intn(0), 0);
        for _ in 0..1000 {
            assert!(ThreadRandom.intn(7) < 7);
        }
    }

    #[test]
    fn errors_do_not_stop_other_rule_sets() {
        let rule_sets = vec![
            CacheRuleSet {
                name: "empty".into(),
                version: String::new(),
                model_groups: Vec::new(),
            },
            CacheRuleSet {
                name: "rootless".into(),
                version: String::new(),
                model_groups: vec![CacheModelGroup {
                    tree: Arc::new(RequestTree::without_root()),
                    ..group(100, "x")
                }],
            },
            CacheRuleSet {
                name: "fine".into(),
                version: String::new(),
                model_groups: vec![group(100, "y")],
            },
        ];
        let result = handle_processed_auction_request(
            &rule_sets,
            &RequestWrapper::default(),
            &ThreadRandom,
        );
        assert_eq!(
            result.errors,
            vec![
                "rule set 'empty': no model groups available".to_owned(),
                "rule set 'rootless': tree root is nil".to_owned(),
            ]
        );
        assert!(result.change_set.is_empty());
    }
}
