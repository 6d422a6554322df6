use bidrules::functions::{new_request_schema_function, new_result_function};
use bidrules::{
    BuildError, HookResult, ModelGroup, RequestTree, RequestWrapper, TreeBuild, TreeBuilder,
};
use serde_json::json;

fn group(doc: serde_json::Value) -> ModelGroup {
    serde_json::from_value(doc).unwrap()
}

fn build(group: &ModelGroup) -> Result<RequestTree, BuildError> {
    TreeBuilder::new(group, new_request_schema_function, new_result_function).build_tree()
}

fn tags(tree: &RequestTree, request: serde_json::Value, data_center: &str) -> Vec<String> {
    let wrapper = RequestWrapper::from_json(&request.to_string())
        .unwrap()
        .with_data_center(data_center);
    let mut result = HookResult::new();
    tree.run(&wrapper, &mut result).unwrap();
    result
        .analytics_tags
        .into_iter()
        .map(|t| format!("{}={}", t.rule_fired, t.analytics_value))
        .collect()
}

fn log(value: &str) -> serde_json::Value {
    json!({"function": "logATag", "args": {"analyticsValue": value}})
}

#[test]
fn mixed_schema_functions() {
    let group = group(json!({
        "schema": [
            {"function": "dataCenterIn", "args": {"datacenters": ["us-east", "us-west"]}},
            {"function": "deviceType"},
            {"function": "gppSidAvailable"}
        ],
        "rules": [
            {"conditions": ["true", "phone", "true"], "results": [log("us-phone-gpp")]},
            {"conditions": ["true", "*", "*"], "results": [log("us-other")]},
            {"conditions": ["false", "*", "*"], "results": [log("elsewhere")]}
        ],
        "default": [log("fallback")]
    }));
    let tree = build(&group).unwrap();

    let phone = json!({"device": {"devicetype": 4}, "regs": {"gpp_sid": [2]}});
    assert_eq!(tags(&tree, phone.clone(), "us-east"), vec!["true|phone|true=us-phone-gpp"]);
    assert_eq!(tags(&tree, phone, "eu-central"), vec!["false|phone|true=elsewhere"]);

    let tablet = json!({"device": {"devicetype": 5}, "regs": {"gpp_sid": [-1]}});
    assert_eq!(tags(&tree, tablet, "us-west"), vec!["true|tablet|false=us-other"]);
}

#[test]
fn partial_path_falls_back_to_defaults() {
    let group = group(json!({
        "schema": [{"function": "domain"}, {"function": "channel"}],
        "rules": [{"conditions": ["news.example", "amp"], "results": [log("amp-news")]}],
        "default": [log("fallback")]
    }));
    let tree = build(&group).unwrap();

    let request = json!({
        "site": {"domain": "news.example"},
        "ext": {"prebid": {"channel": {"name": "app"}}}
    });
    assert_eq!(tags(&tree, request, "dc"), vec!["news.example|app=fallback"]);
}

#[test]
fn rebuilding_yields_equivalent_trees() {
    let group = group(json!({
        "schema": [{"function": "bundleIn", "args": {"bundles": ["com.example.game"]}}],
        "rules": [
            {"conditions": ["true"], "results": [log("game")]},
            {"conditions": ["false"], "results": [log("other")]}
        ]
    }));
    let first = build(&group).unwrap();
    let second = build(&group).unwrap();
    assert_eq!(first.to_string(), second.to_string());

    for bundle in ["com.example.game", "com.example.news"] {
        let request = json!({"app": {"bundle": bundle}});
        assert_eq!(tags(&first, request.clone(), "dc"), tags(&second, request, "dc"));
    }
}

#[test]
fn bad_arguments_name_the_function() {
    let group = group(json!({
        "schema": [{"function": "percent", "args": {"pct": "half"}}],
        "rules": [{"conditions": ["true"], "results": []}]
    }));
    let err = build(&group).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("invalid arguments for function percent: "));
}
