use crate::types::{
    Node, ResultFunction, ResultFunctionFailure, ResultFunctionMeta, Tree, TreeError,
};

impl<C, A> Tree<C, A> {
    /// Evaluate the tree against `ctx`, recording results into `acc`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] if the tree has no root, a schema function
    /// fails, or one or more result functions fail.
    pub fn run(&self, ctx: &C, acc: &mut A) -> Result<(), TreeError> {
        self.run_with_meta(ctx, acc, ResultFunctionMeta::default())
    }

    /// Like [`run`](Self::run), seeding result functions with the analytics
    /// key and version of the model group being evaluated.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_with_meta(
        &self,
        ctx: &C,
        acc: &mut A,
        mut meta: ResultFunctionMeta,
    ) -> Result<(), TreeError> {
        let root = self.root.as_ref().ok_or(TreeError::NilRoot)?;
        let halt = descend(root, ctx, &mut meta)?;

        let functions = if halt.result_functions.is_empty() {
            &self.default_functions
        } else {
            &halt.result_functions
        };

        let failures = execute(functions, ctx, acc, &meta);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TreeError::ResultFunctions(failures))
        }
    }
}

fn descend<'t, C, A>(
    root: &'t Node<C, A>,
    ctx: &C,
    meta: &mut ResultFunctionMeta,
) -> Result<&'t Node<C, A>, TreeError> {
    let mut current = root;
    while let Some(schema) = &current.schema_function {
        let discriminator = schema.call(ctx).map_err(|source| TreeError::SchemaFunction {
            name: schema.name(),
            source,
        })?;
        meta.record(schema.name(), &discriminator);
        match current.child(&discriminator) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(current)
}

fn execute<C, A>(
    functions: &[Box<dyn ResultFunction<C, A>>],
    ctx: &C,
    acc: &mut A,
    meta: &ResultFunctionMeta,
) -> Vec<ResultFunctionFailure> {
    functions
        .iter()
        .filter_map(|f| {
            f.call(ctx, acc, meta).err().map(|error| ResultFunctionFailure {
                name: f.name(),
                error,
            })
        })
        .collect()
}
