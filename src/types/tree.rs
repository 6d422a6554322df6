use std::collections::HashMap;
use std::fmt;

use super::error::FunctionError;

/// Child key that matches any discriminator without an exact child.
pub const WILDCARD: &str = "*";

/// Classifies a request context into a discriminator string.
///
/// The returned string selects which child of the current node evaluation
/// descends into.
pub trait SchemaFunction<C>: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns [`FunctionError`] when the context lacks the data the
    /// function classifies on.
    fn call(&self, ctx: &C) -> Result<String, FunctionError>;

    fn name(&self) -> &'static str;
}

/// Records the outcome of a tree walk into the accumulator.
pub trait ResultFunction<C, A>: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns [`FunctionError`] when the mutation cannot be computed from
    /// the context.
    fn call(&self, ctx: &C, acc: &mut A, meta: &ResultFunctionMeta) -> Result<(), FunctionError>;

    fn name(&self) -> &'static str;
}

/// Details of the evaluation that led to a result function being called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFunctionMeta {
    pub analytics_key: String,
    pub model_version: String,
    /// Discriminators of the path taken, joined with `|`.
    pub rule_fired: String,
    /// `(schema function name, discriminator)` for every level visited.
    pub schema_results: Vec<(&'static str, String)>,
}

impl ResultFunctionMeta {
    #[must_use]
    pub fn new(analytics_key: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            analytics_key: analytics_key.into(),
            model_version: model_version.into(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, function: &'static str, value: &str) {
        if !self.rule_fired.is_empty() || !self.schema_results.is_empty() {
            self.rule_fired.push('|');
        }
        self.rule_fired.push_str(value);
        self.schema_results.push((function, value.to_owned()));
    }
}

/// A single node of a decision tree.
///
/// Nodes are built once and never mutated after the owning [`Tree`] is
/// published.
pub struct Node<C, A> {
    pub schema_function: Option<Box<dyn SchemaFunction<C>>>,
    pub children: HashMap<String, Node<C, A>>,
    pub result_functions: Vec<Box<dyn ResultFunction<C, A>>>,
}

impl<C, A> Node<C, A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the child for `discriminator`, falling back to the wildcard child.
    #[must_use]
    pub fn child(&self, discriminator: &str) -> Option<&Node<C, A>> {
        self.children
            .get(discriminator)
            .or_else(|| self.children.get(WILDCARD))
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl<C, A> Default for Node<C, A> {
    fn default() -> Self {
        Self {
            schema_function: None,
            children: HashMap::new(),
            result_functions: Vec::new(),
        }
    }
}

impl<C, A> fmt::Debug for Node<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result_names: Vec<&str> = self.result_functions.iter().map(|r| r.name()).collect();
        f.debug_struct("Node")
            .field(
                "schema_function",
                &self.schema_function.as_ref().map(|s| s.name()),
            )
            .field("children", &self.children)
            .field("result_functions", &result_names)
            .finish()
    }
}

/// A decision tree over context `C` producing into accumulator `A`.
///
/// Immutable once built; designed to live behind `Arc` and be evaluated from
/// many threads at once.
pub struct Tree<C, A> {
    pub root: Option<Node<C, A>>,
    pub default_functions: Vec<Box<dyn ResultFunction<C, A>>>,
}

impl<C, A> Tree<C, A> {
    /// A tree with an empty root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Some(Node::new()),
            default_functions: Vec::new(),
        }
    }

    /// A tree without a root. Running it fails with [`TreeError::NilRoot`](super::TreeError::NilRoot).
    #[must_use]
    pub fn without_root() -> Self {
        Self {
            root: None,
            default_functions: Vec::new(),
        }
    }

    /// Number of nodes reachable from the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count<C, A>(node: &Node<C, A>) -> usize {
            1 + node.children.values().map(count).sum::<usize>()
        }
        self.root.as_ref().map_or(0, count)
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn depth<C, A>(node: &Node<C, A>) -> usize {
            node.children.values().map(|c| 1 + depth(c)).max().unwrap_or(0)
        }
        self.root.as_ref().map_or(0, depth)
    }
}

impl<C, A> Default for Tree<C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, A> fmt::Debug for Tree<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defaults: Vec<&str> = self.default_functions.iter().map(|r| r.name()).collect();
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("default_functions", &defaults)
            .finish()
    }
}

impl<C, A> fmt::Display for Tree<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree({} nodes, depth {}, {} default functions)",
            self.node_count(),
            self.depth(),
            self.default_functions.len(),
        )
    }
}
