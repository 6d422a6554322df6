mod geoscope;
mod tree_builder;

pub use geoscope::{
    CountryExclusions, CountryGroups, EEA_COUNTRIES, GeoscopeTreeBuilder, ParsedGeoscopes, Policy,
    default_country_groups, merge_country_groups,
};
pub use tree_builder::TreeBuilder;

use crate::types::{BuildError, Tree};

/// Populates a tree from some description of it.
pub trait TreeBuild<C, A> {
    /// Add nodes to `tree`.
    ///
    /// On error `tree` may be partially populated and must be discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when a function cannot be constructed or the
    /// description is inconsistent.
    fn build(&self, tree: &mut Tree<C, A>) -> Result<(), BuildError>;

    /// Build into a fresh tree, returning it only when the whole build
    /// succeeded.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    fn build_tree(&self) -> Result<Tree<C, A>, BuildError> {
        let mut tree = Tree::new();
        self.build(&mut tree)?;
        Ok(tree)
    }
}
