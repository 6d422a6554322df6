use crate::config::ModelGroup;
use crate::functions::{ResultFuncFactory, SchemaFuncFactory};
use crate::types::{BuildError, Node, Tree};

use super::TreeBuild;

/// Compiles the declarative rules of one [`ModelGroup`] into a tree.
///
/// Each rule's conditions are inserted as a path from the root, one level per
/// schema declaration. Rules sharing a prefix share nodes: a later rule can
/// add result functions to an existing node but never replaces its schema
/// function.
pub struct TreeBuilder<'a, C, A> {
    config: &'a ModelGroup,
    schema_factory: SchemaFuncFactory<C>,
    result_factory: ResultFuncFactory<C, A>,
}

impl<'a, C, A> TreeBuilder<'a, C, A> {
    #[must_use]
    pub fn new(
        config: &'a ModelGroup,
        schema_factory: SchemaFuncFactory<C>,
        result_factory: ResultFuncFactory<C, A>,
    ) -> Self {
        Self {
            config,
            schema_factory,
            result_factory,
        }
    }
}

impl<C, A> TreeBuild<C, A> for TreeBuilder<'_, C, A> {
    fn build(&self, tree: &mut Tree<C, A>) -> Result<(), BuildError> {
        let root = tree.root.get_or_insert_with(Node::new);

        for (rule_index, rule) in self.config.rules.iter().enumerate() {
            let mut current = &mut *root;
            for (level, condition) in rule.conditions.iter().enumerate() {
                if current.schema_function.is_none() {
                    let decl = self.config.schema.get(level).ok_or(
                        BuildError::MissingSchemaFunction {
                            rule: rule_index,
                            level,
                        },
                    )?;
                    current.schema_function =
                        Some((self.schema_factory)(&decl.function, decl.args.as_ref())?);
                }
                current = current.children.entry(condition.clone()).or_default();
            }

            for decl in &rule.results {
                current
                    .result_functions
                    .push((self.result_factory)(&decl.function, decl.args.as_ref())?);
            }
        }

        for decl in &self.config.default {
            tree.default_functions
                .push((self.result_factory)(&decl.function, decl.args.as_ref())?);
        }

        Ok(())
    }
}
