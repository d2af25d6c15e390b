//! Lazily synchronized external nodes

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{model_with_sink, types, Recorder};
use serde_json::json;
use sylva_core::{
    CachingPolicy, DefaultFactory, Model, Node, NodeFactory, Path, Result, SylvaError,
};

/// Loads two files and a size into a folder
#[derive(Default)]
struct Folder {
    loads: Cell<usize>,
    fail: Cell<bool>,
}

impl CachingPolicy for Folder {
    fn sync(&self, node: &Node) -> Result<()> {
        if self.fail.get() {
            return Err(SylvaError::Internal {
                message: "disk offline".to_string(),
            });
        }
        self.loads.set(self.loads.get() + 1);
        let model = node.model().clone();
        for name in ["one", "two"] {
            let file = model.create_node("file");
            file.set_attribute("id", name)?;
            node.add_child(&file, None)?;
        }
        node.set_attribute("size", 2)?;
        Ok(())
    }

    fn static_attributes(&self) -> Vec<String> {
        vec!["path".to_string()]
    }
}

/// Makes every `folder` external with the shared policy
struct FolderFactory(Rc<Folder>);

impl NodeFactory for FolderFactory {
    fn create_object(&self, model: &Model, parent: Option<&Node>, node_type: &str) -> Node {
        if node_type == "folder" {
            let policy: Rc<dyn CachingPolicy> = self.0.clone();
            Node::new_external(model, node_type, Some(policy))
        } else {
            DefaultFactory.create_object(model, parent, node_type)
        }
    }
}

fn folder_model() -> (Model, Rc<Folder>) {
    let policy = Rc::new(Folder::default());
    let model = Model::builder()
        .factory(Rc::new(FolderFactory(policy.clone())))
        .build();
    (model, policy)
}

#[test]
fn test_scenario_first_read_loads_content() {
    // GIVEN a dirty folder with a listener
    let (model, policy) = folder_model();
    let folder = model.create_node("folder");
    assert!(folder.is_external());
    assert!(folder.is_dirty());
    let recorder = Recorder::new();
    let _hook = recorder.attach(&folder);

    // WHEN its children are read twice
    let first = folder.children();
    let second = folder.children();

    // THEN the policy ran once and the folder is clean
    assert_eq!(policy.loads.get(), 1);
    assert_eq!(types(first), vec!["file", "file"]);
    assert_eq!(second.len(), 2);
    assert!(!folder.is_dirty());

    // AND listeners saw the load followed by the clean transition
    let events = recorder.take();
    assert_eq!(events.first().map(String::as_str), Some("add folder+file@0"));
    assert_eq!(events.last().map(String::as_str), Some("dirty folder=false"));
}

#[test]
fn test_attribute_reads_also_load() {
    let (model, policy) = folder_model();
    let folder = model.create_node("folder");

    assert_eq!(folder.attribute("size"), Some(json!(2)));
    assert_eq!(policy.loads.get(), 1);
}

#[test]
fn test_scenario_clear_cache_keeps_static_attributes() {
    // GIVEN a loaded folder with a static path attribute
    let (model, policy) = folder_model();
    let folder = model.create_node("folder");
    folder.sync().unwrap();
    folder.set_attribute("path", "/tmp").unwrap();
    let recorder = Recorder::new();
    let _hook = recorder.attach(&folder);

    // WHEN the cache is cleared
    folder.clear_cache().unwrap();

    // THEN the folder is dirty again and only the static attribute survived
    assert!(folder.is_dirty());
    let events = recorder.take();
    assert!(events.contains(&"clear folder.size".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("dirty folder=true"));

    // AND the next read loads again
    assert_eq!(folder.attribute("path"), Some(json!("/tmp")));
    assert_eq!(folder.child_count(), 2);
    assert_eq!(policy.loads.get(), 2);
}

#[test]
fn test_failed_lazy_load_reaches_the_sink() {
    let policy = Rc::new(Folder::default());
    policy.fail.set(true);
    let (model, sink) = model_with_sink();
    let shared: Rc<dyn CachingPolicy> = policy.clone();
    let folder = Node::new_external(&model, "folder", Some(shared));

    assert!(folder.children().is_empty());
    assert!(folder.is_dirty());
    assert!(matches!(
        sink.errors().as_slice(),
        [SylvaError::SyncFailed { node_type, .. }] if node_type == "folder"
    ));

    // Explicit sync reports the failure directly
    assert!(matches!(folder.sync(), Err(SylvaError::SyncFailed { .. })));

    policy.fail.set(false);
    folder.sync().unwrap();
    assert_eq!(folder.child_count(), 2);
}

#[test]
fn test_paths_see_loaded_content() {
    let (model, policy) = folder_model();
    let root = model.create_node("drive");
    let folder = model.create_node("folder");
    root.add_child(&folder, None).unwrap();
    assert_eq!(policy.loads.get(), 0);

    let found = Path::compile("folder/file[@id='two']").unwrap().query(&root);
    assert_eq!(found.len(), 1);
    assert_eq!(policy.loads.get(), 1);
}

#[test]
fn test_plain_nodes_reject_external_operations() {
    let model = Model::new();
    let plain = model.create_node("x");

    assert!(!plain.is_dirty());
    assert!(matches!(plain.sync(), Err(SylvaError::Unsupported { .. })));
    assert!(matches!(plain.clear_cache(), Err(SylvaError::Unsupported { .. })));
    assert!(matches!(plain.set_dirty(true), Err(SylvaError::Unsupported { .. })));

    // An external node without a policy cannot sync either
    let bare = model.create_external_node("x");
    assert!(bare.is_dirty());
    assert!(matches!(bare.sync(), Err(SylvaError::Unsupported { .. })));
    assert!(bare.children().is_empty());
}
