use thiserror::Error;

use crate::types::{BuildError, ConfigError, HookError, TreeError};

/// Unified error type covering configuration, compilation and evaluation.
///
/// Returned where a single operation can fail for more than one reason, such
/// as [`CacheEntry::new`](crate::CacheEntry::new), which both validates and
/// compiles a configuration document.
#[derive(Debug, Error)]
pub enum RulesEngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_messages() {
        let err: RulesEngineError = ConfigError::Empty.into();
        assert_eq!(err.to_string(), "empty rules engine configuration");

        let err: RulesEngineError = HookError::NoModelGroups.into();
        assert_eq!(err.to_string(), "no model groups available");

        let err: RulesEngineError = TreeError::NilRoot.into();
        assert_eq!(err.to_string(), "tree root is nil");
    }
}
