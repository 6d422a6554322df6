use std::collections::HashMap;

use bidrules::{
    FunctionError, Node, ResultFunction, ResultFunctionMeta, SchemaFunction, Tree, TreeError,
    WILDCARD,
};

// A tiny domain unrelated to bidding: route a parcel by its attributes.

#[derive(Debug, Default)]
struct Parcel {
    attrs: HashMap<&'static str, &'static str>,
}

impl Parcel {
    fn with(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            attrs: pairs.iter().copied().collect(),
        }
    }
}

#[derive(Debug)]
struct Attr(&'static str);

impl SchemaFunction<Parcel> for Attr {
    fn call(&self, ctx: &Parcel) -> Result<String, FunctionError> {
        ctx.attrs
            .get(self.0)
            .map(|v| (*v).to_owned())
            .ok_or(FunctionError::MissingField(self.0))
    }

    fn name(&self) -> &'static str {
        self.0
    }
}

#[derive(Debug)]
struct Route(&'static str);

impl ResultFunction<Parcel, Vec<String>> for Route {
    fn call(
        &self,
        _: &Parcel,
        acc: &mut Vec<String>,
        meta: &ResultFunctionMeta,
    ) -> Result<(), FunctionError> {
        acc.push(format!("{}@{}", self.0, meta.rule_fired));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "route"
    }
}

#[derive(Debug)]
struct Broken;

impl ResultFunction<Parcel, Vec<String>> for Broken {
    fn call(&self, _: &Parcel, _: &mut Vec<String>, _: &ResultFunctionMeta) -> Result<(), FunctionError> {
        Err(FunctionError::MissingField("label"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

type ParcelNode = Node<Parcel, Vec<String>>;
type ParcelTree = Tree<Parcel, Vec<String>>;

fn leaf(results: Vec<Box<dyn ResultFunction<Parcel, Vec<String>>>>) -> ParcelNode {
    ParcelNode {
        result_functions: results,
        ..ParcelNode::new()
    }
}

/// size -> { small: dest -> { eu: ground, *: air }, large: freight, *: manual }
fn routing_tree() -> ParcelTree {
    let mut small = ParcelNode::new();
    small.schema_function = Some(Box::new(Attr("dest")));
    small.children.insert("eu".into(), leaf(vec![Box::new(Route("ground"))]));
    small.children.insert(WILDCARD.into(), leaf(vec![Box::new(Route("air"))]));

    let mut root = ParcelNode::new();
    root.schema_function = Some(Box::new(Attr("size")));
    root.children.insert("small".into(), small);
    root.children.insert("large".into(), leaf(vec![Box::new(Route("freight"))]));
    root.children.insert(WILDCARD.into(), leaf(vec![Box::new(Route("manual"))]));

    Tree {
        root: Some(root),
        default_functions: vec![Box::new(Route("default"))],
    }
}

fn run(tree: &ParcelTree, pairs: &[(&'static str, &'static str)]) -> Result<Vec<String>, TreeError> {
    let mut acc = Vec::new();
    tree.run(&Parcel::with(pairs), &mut acc)?;
    Ok(acc)
}

#[test]
fn exact_matches_descend() {
    let tree = routing_tree();
    assert_eq!(run(&tree, &[("size", "small"), ("dest", "eu")]).unwrap(), vec!["ground@small|eu"]);
    assert_eq!(run(&tree, &[("size", "large")]).unwrap(), vec!["freight@large"]);
}

#[test]
fn wildcard_catches_misses_at_each_level() {
    let tree = routing_tree();
    assert_eq!(run(&tree, &[("size", "small"), ("dest", "us")]).unwrap(), vec!["air@small|us"]);
    assert_eq!(run(&tree, &[("size", "medium")]).unwrap(), vec!["manual@medium"]);
}

#[test]
fn empty_discriminator_is_an_ordinary_value() {
    let mut tree = routing_tree();
    let root = tree.root.as_mut().unwrap();
    root.children.insert(String::new(), leaf(vec![Box::new(Route("blank"))]));
    assert_eq!(run(&tree, &[("size", "")]).unwrap(), vec!["blank@"]);
}

#[test]
fn halting_without_results_runs_defaults() {
    let mut tree = routing_tree();
    tree.root.as_mut().unwrap().children.remove(WILDCARD);
    assert_eq!(run(&tree, &[("size", "medium")]).unwrap(), vec!["default@medium"]);
}

#[test]
fn schema_failure_stops_evaluation() {
    let tree = routing_tree();
    let err = run(&tree, &[("size", "small")]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "schema function dest failed: dest is not present in request"
    );
}

#[test]
fn nil_root_leaves_accumulator_untouched() {
    let tree = ParcelTree::without_root();
    let mut acc = vec!["existing".to_owned()];
    assert_eq!(tree.run(&Parcel::default(), &mut acc), Err(TreeError::NilRoot));
    assert_eq!(acc, vec!["existing"]);
}

#[test]
fn failing_result_functions_do_not_stop_siblings() {
    let mut tree = routing_tree();
    tree.root.as_mut().unwrap().children.insert(
        "fragile".into(),
        leaf(vec![Box::new(Broken), Box::new(Route("after")), Box::new(Broken)]),
    );

    let mut acc = Vec::new();
    let err = tree
        .run(&Parcel::with(&[("size", "fragile")]), &mut acc)
        .unwrap_err();
    assert_eq!(acc, vec!["after@fragile"]);
    match err {
        TreeError::ResultFunctions(failures) => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn meta_carries_model_group_identity() {
    #[derive(Debug)]
    struct Identify;

    impl ResultFunction<Parcel, Vec<String>> for Identify {
        fn call(&self, _: &Parcel, acc: &mut Vec<String>, meta: &ResultFunctionMeta) -> Result<(), FunctionError> {
            acc.push(format!("{}:{}", meta.analytics_key, meta.model_version));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "identify"
        }
    }

    let tree = ParcelTree {
        root: Some(leaf(vec![Box::new(Identify)])),
        default_functions: Vec::new(),
    };
    let mut acc = Vec::new();
    tree.run_with_meta(&Parcel::default(), &mut acc, ResultFunctionMeta::new("exp-1", "v2"))
        .unwrap();
    assert_eq!(acc, vec!["exp-1:v2"]);
}

#[test]
fn display_summarises_shape() {
    assert_eq!(
        routing_tree().to_string(),
        "Tree(6 nodes, depth 2, 1 default functions)"
    );
}
