//! Path compilation and evaluation

mod common;

use common::{find, sample_tree, types};
use serde_json::json;
use sylva_core::path::{AttributeWatch, FnPredicate, PathElement};
use sylva_core::{Axis, Model, Path, PathSyntaxError, SylvaError, VariableScope};

fn query(text: &str, context: &sylva_core::Node) -> Vec<String> {
    types(Path::compile(text).unwrap().query(context))
}

#[test]
fn test_axes_from_a_leaf() {
    let model = Model::new();
    let r = sample_tree(&model);
    let a2 = find(&r, "a2");

    assert_eq!(query(".", &a2), vec!["a2"]);
    assert_eq!(query("..", &a2), vec!["a"]);
    assert_eq!(query("ancestor::*", &a2), vec!["a", "r"]);
    assert_eq!(query("ancestor-or-self::*", &a2), vec!["a2", "a", "r"]);
    assert_eq!(query("preceding-sibling::*", &a2), vec!["a1"]);
    assert_eq!(query("following::*", &a2), vec!["b", "c", "c1"]);
    assert_eq!(query("preceding::*", &a2), vec!["a1"]);
    assert_eq!(query("/", &a2), vec!["r"]);
    assert_eq!(query("//c1", &a2), vec!["c1"]);
}

#[test]
fn test_predicates_filter_candidates() {
    let model = Model::new();
    let r = sample_tree(&model);
    find(&r, "b").set_attribute("id", "bee").unwrap();
    find(&r, "c").set_attribute("rank", 3).unwrap();

    assert_eq!(query("*[2]", &r), vec!["b"]);
    assert_eq!(query("*[last()]", &r), vec!["c"]);
    assert_eq!(query("*[@id='bee']", &r), vec!["b"]);
    assert_eq!(query("*[@rank=3]", &r), vec!["c"]);
    assert_eq!(query("*[@rank]", &r), vec!["c"]);
    assert_eq!(query("*[c1]", &r), vec!["c"]);
    assert_eq!(query("*[*]", &r), vec!["a", "c"]);
}

#[test]
fn test_attribute_axis_yields_attribute_nodes() {
    let model = Model::new();
    let r = sample_tree(&model);
    let b = find(&r, "b");
    b.set_attribute("id", "bee").unwrap();
    b.set_attribute("note", "hi").unwrap();

    let found = Path::compile("b/@note").unwrap().query(&r);
    assert_eq!(found.len(), 1);
    assert!(found[0].is_attribute_node());
    assert_eq!(found[0].value(), Some(json!("hi")));

    // Writing the attribute node writes through to the owner
    found[0].set_value("bye").unwrap();
    assert_eq!(b.attribute("note"), Some(json!("bye")));
    assert!(found[0].parent().unwrap().ptr_eq(&b));
}

#[test]
fn test_variables_in_predicates() {
    let model = Model::new();
    let r = sample_tree(&model);
    find(&r, "a").set_attribute("owner", "ann").unwrap();
    find(&r, "c").set_attribute("owner", "bob").unwrap();
    let scope = VariableScope::new(&model);
    let path = Path::compile_with("*[@owner=$user]", Some(&scope)).unwrap();

    assert!(path.query(&r).is_empty());
    scope.set("user", "bob");
    assert_eq!(types(path.query(&r)), vec!["c"]);
}

#[test]
fn test_closure_predicates() {
    let model = Model::new();
    let r = sample_tree(&model);
    let path = Path::from_elements(vec![PathElement::new(Axis::CHILD, None).with_predicate(
        FnPredicate::new("leafy", |ctx| ctx.node.child_count() == 0)
            .watching(AttributeWatch::None),
    )]);

    assert_eq!(types(path.query(&r)), vec!["b"]);
    assert_eq!(path.to_string(), "*[leafy()]");
}

#[test]
fn test_syntax_errors_are_distinct() {
    let err: PathSyntaxError = Path::compile("a/[1]").unwrap_err();
    assert_eq!(err.position, 2);
    assert_eq!(err.path, "a/[1]");

    let wrapped: SylvaError = err.into();
    assert!(matches!(wrapped, SylvaError::PathSyntax(_)));
}

#[test]
fn test_from_str_and_display() {
    let path: Path = "/r/a[@id='x']/following-sibling::*".parse().unwrap();
    assert!(path.is_absolute());
    assert_eq!(path.to_string(), "/r/a[@id='x']/following-sibling::*");
    assert_eq!(path.len(), 3);
}
