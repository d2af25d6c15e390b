//! Change records, change sets and tree merging

mod common;

use common::{find, sample_tree, types, Recorder};
use serde_json::json;
use sylva_core::change::{ChangeKind, ChangeTarget};
use sylva_core::{
    diff_trees, ChangeRecord, ChangeSet, IntersectChangeSet, Model, Node, SylvaError,
    UnionChangeSet,
};

fn catalog(model: &Model, entries: &[(&str, i64)]) -> Node {
    let root = model.create_node("catalog");
    for (id, price) in entries {
        let item = model.create_node("item");
        item.set_attribute("id", *id).unwrap();
        item.set_attribute("price", *price).unwrap();
        root.add_child(&item, None).unwrap();
    }
    root
}

fn ids(root: &Node) -> Vec<String> {
    let mut ids: Vec<String> = root
        .children()
        .iter()
        .filter_map(|c| c.attribute_text("id"))
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_scenario_diff_then_apply_converges() {
    // GIVEN two catalogs that differ in membership and one price
    let model = Model::new();
    let lhs = catalog(&model, &[("x", 1), ("y", 2)]);
    let rhs = catalog(&model, &[("y", 3), ("z", 4)]);

    // WHEN the diff is applied to the left tree
    let mut changes = ChangeSet::new();
    diff_trees(&lhs, &rhs, &mut changes);
    changes.apply_changes().unwrap();

    // THEN the left tree matches the right one
    assert_eq!(ids(&lhs), vec!["y", "z"]);
    assert_eq!(lhs.child("item", "y").unwrap().attribute("price"), Some(json!(3)));
    let mut again = ChangeSet::new();
    diff_trees(&lhs, &rhs, &mut again);
    assert!(again.is_empty(), "{:?}", again);

    // AND the right tree is untouched
    assert_eq!(ids(&rhs), vec!["y", "z"]);
    assert!(!lhs.child("item", "z").unwrap().ptr_eq(&rhs.child("item", "z").unwrap()));
}

#[test]
fn test_applying_a_diff_notifies_listeners() {
    let model = Model::new();
    let lhs = catalog(&model, &[("x", 1)]);
    let rhs = catalog(&model, &[("x", 5)]);
    let recorder = Recorder::new();
    let x = lhs.child("item", "x").unwrap();
    let _hook = recorder.attach(&x);

    let mut changes = ChangeSet::new();
    diff_trees(&lhs, &rhs, &mut changes);
    changes.apply_changes().unwrap();

    assert_eq!(recorder.take(), vec!["set item.price=5"]);
}

#[test]
fn test_union_and_intersect_merges() {
    let model = Model::new();
    let rhs = catalog(&model, &[("y", 2), ("z", 3)]);

    let union_side = catalog(&model, &[("x", 1), ("y", 2)]);
    let mut union = UnionChangeSet::new();
    diff_trees(&union_side, &rhs, &mut union);
    assert!(union.records().iter().all(|r| r.kind() != ChangeKind::RemoveChild));
    union.apply_changes().unwrap();
    assert_eq!(ids(&union_side), vec!["x", "y", "z"]);

    let intersect_side = catalog(&model, &[("x", 1), ("y", 2)]);
    let mut intersect = IntersectChangeSet::new();
    diff_trees(&intersect_side, &rhs, &mut intersect);
    assert!(intersect.records().iter().all(|r| r.kind() == ChangeKind::RemoveChild));
    intersect.into_inner().apply_changes().unwrap();
    assert_eq!(ids(&intersect_side), vec!["y"]);
}

#[test]
fn test_scenario_unbound_records_replay_on_a_copy() {
    // GIVEN records made against one tree
    let model = Model::new();
    let r = sample_tree(&model);
    let a = find(&r, "a");
    let a2 = find(&r, "a2");
    let mut local = ChangeSet::new();
    local.push(ChangeRecord::change_attribute(&a2, "flag", json!(true)));
    local.push(ChangeRecord::remove_child(&a, &find(&r, "a1")));

    // WHEN they are unbound relative to the root and applied to a copy
    let copy = r.clone_tree();
    let mut portable = ChangeSet::new();
    for record in &local {
        portable.push(record.unbind(&r).unwrap());
    }
    assert!(portable.records().iter().all(|rec| !rec.is_bound()));
    portable.apply_changes_to(&copy).unwrap();

    // THEN the copy changes and the original does not
    assert_eq!(types(find(&copy, "a").children()), vec!["a2"]);
    assert_eq!(find(&copy, "a2").attribute("flag"), Some(json!(true)));
    assert_eq!(types(a.children()), vec!["a1", "a2"]);
    assert_eq!(a2.attribute("flag"), None);
}

#[test]
fn test_unbound_target_formats() {
    let model = Model::new();
    let r = sample_tree(&model);
    find(&r, "c").set_attribute("id", "see").unwrap();
    let record = ChangeRecord::clear_attribute(&find(&r, "c1"), "x")
        .unbind(&r)
        .unwrap();

    match record.target() {
        ChangeTarget::Unbound(path) => assert_eq!(path.to_string(), "c[@id='see']/c1[1]"),
        other => panic!("expected an unbound target, got {}", other),
    }
    assert!(ChangeRecord::clear_attribute(&model.create_node("stray"), "x")
        .unbind(&r)
        .is_none());
}

#[test]
fn test_bind_resolves_removal_by_index() {
    let model = Model::new();
    let r = sample_tree(&model);
    let unbound = ChangeRecord::remove_child(&find(&r, "a"), &find(&r, "a2"))
        .unbind(&r)
        .unwrap();

    let copy = r.clone_tree();
    let bound = unbound.bind(&copy).unwrap();
    match &bound {
        ChangeRecord::RemoveChild { child, index, .. } => {
            assert_eq!(*index, 1);
            assert!(child.as_ref().unwrap().ptr_eq(&find(&copy, "a2")));
        }
        other => panic!("unexpected record {}", other),
    }
    bound.apply().unwrap();
    assert_eq!(types(find(&copy, "a").children()), vec!["a1"]);
}

#[test]
fn test_unbound_records_need_a_root() {
    let model = Model::new();
    let r = sample_tree(&model);
    let unbound = ChangeRecord::change_attribute(&find(&r, "b"), "k", json!(1))
        .unbind(&r)
        .unwrap();

    assert!(matches!(
        unbound.apply(),
        Err(SylvaError::InvalidOperation { .. })
    ));

    // A root without the target skips the record on apply but fails to bind
    let other = model.create_node("r");
    assert!(unbound.apply_to(&other).is_ok());
    assert!(matches!(
        unbound.bind(&other),
        Err(SylvaError::InvalidOperation { .. })
    ));
}

#[test]
fn test_normalize_then_apply() {
    let model = Model::new();
    let r = sample_tree(&model);
    let b = find(&r, "b");
    let temp = model.create_node("temp");
    let mut changes = ChangeSet::new();
    changes.push(ChangeRecord::change_attribute(&b, "n", json!(1)));
    changes.push(ChangeRecord::add_child(&b, &temp, None));
    changes.push(ChangeRecord::change_attribute(&b, "n", json!(2)));
    changes.push(ChangeRecord::remove_child(&b, &temp));

    changes.normalize();
    assert_eq!(changes.len(), 1);
    changes.apply_changes().unwrap();

    assert_eq!(b.attribute("n"), Some(json!(2)));
    assert_eq!(b.child_count(), 0);
    changes.clear_changes();
    assert!(changes.is_empty());
}
