mod common;

use common::setup_test_config_dir;
use gridlist::columns::ColumnManager;
use gridlist::persistence::{FileStore, PreferenceStore, Preferences, StorageKeys};
use gridlist::{flatten, ColumnNode, ColumnSchema};
use serde_json::Value;

fn schema() -> ColumnSchema<Value> {
    ColumnSchema::new(vec![
        ColumnNode::leaf("name", "Name"),
        ColumnNode::leaf("amount", "Amount"),
        ColumnNode::leaf("status", "Status").with_visible(false),
    ])
}

fn manager(store: &FileStore, schema: ColumnSchema<Value>) -> ColumnManager<Value> {
    let prefs = Preferences::new(Box::new(store.clone()), StorageKeys::for_view("orders"));
    ColumnManager::new(schema, prefs)
}

fn visible(m: &ColumnManager<Value>) -> Vec<String> {
    m.ordered_columns(false, false)
        .iter()
        .map(|c| c.key.clone())
        .collect()
}

#[test]
fn test_legacy_preferences_merge_with_schema() {
    let (_dir, _config, store) = setup_test_config_dir();
    let keys = StorageKeys::for_view("orders");
    store
        .write(&keys.order, r#"["amount","name","status","ghost"]"#)
        .unwrap();
    store.write(&keys.visibility, r#"["name","status"]"#).unwrap();

    let m = manager(&store, schema());

    assert_eq!(m.order(), ["amount", "name", "status"]);
    let expected: Vec<&str> = vec!["amount", "name"];
    assert_eq!(m.visible_keys().iter().map(String::as_str).collect::<Vec<_>>(), expected);
    assert_eq!(visible(&m), vec!["amount", "name"]);
}

#[test]
fn test_preferences_survive_a_new_instance() {
    let (_dir, _config, store) = setup_test_config_dir();
    {
        let mut m = manager(&store, schema());
        m.set_column_order(&["status".into(), "amount".into(), "name".into()]);
        m.toggle_column("amount", false);
        m.set_column_width("name", 340);
    }

    let m = manager(&store, schema());
    assert_eq!(m.order(), ["status", "amount", "name"]);
    assert!(!m.is_visible("amount"));
    assert_eq!(m.column_width("name"), 340);
    assert_eq!(visible(&m), vec!["name"]);
}

#[test]
fn test_new_schema_column_is_appended_and_visible() {
    let (_dir, _config, store) = setup_test_config_dir();
    {
        let mut m = manager(&store, schema());
        m.set_column_order(&["amount".into(), "name".into(), "status".into()]);
    }

    let extended = ColumnSchema::new(vec![
        ColumnNode::leaf("name", "Name"),
        ColumnNode::leaf("amount", "Amount"),
        ColumnNode::leaf("status", "Status").with_visible(false),
        ColumnNode::group(
            "customer",
            "Customer",
            vec![ColumnNode::leaf("city", "City")],
        ),
    ]);
    let m = manager(&store, extended);
    assert_eq!(m.order(), ["amount", "name", "status", "customer.city"]);
    assert!(m.is_visible("customer.city"));
}

#[test]
fn test_corrupt_blob_falls_back_to_schema_defaults() {
    let (_dir, _config, store) = setup_test_config_dir();
    let keys = StorageKeys::for_view("orders");
    store.write(&keys.order, "{not json").unwrap();
    store
        .write(&keys.visibility, r#"{"version":99,"data":{"visible":[]}}"#)
        .unwrap();

    let m = manager(&store, schema());
    assert_eq!(m.order(), ["name", "amount", "status"]);
    assert_eq!(visible(&m), vec!["name", "amount"]);
}

#[test]
fn test_order_stays_a_permutation_for_any_input() {
    let (_dir, _config, store) = setup_test_config_dir();
    let mut m = manager(&store, schema());
    let inputs: Vec<Vec<String>> = vec![
        vec![],
        vec!["ghost".into()],
        vec!["status".into(), "status".into(), "name".into()],
        vec!["amount".into(), "x".into(), "name".into(), "status".into(), "y".into()],
    ];
    for input in inputs {
        m.set_column_order(&input);
        let mut sorted = m.order().to_vec();
        sorted.sort();
        assert_eq!(sorted, vec!["amount", "name", "status"]);
    }
}

#[test]
fn test_flatten_distributes_over_concatenation() {
    let a: Vec<ColumnNode<Value>> = vec![
        ColumnNode::leaf("id", "ID"),
        ColumnNode::group("lender", "Lender", vec![ColumnNode::leaf("name", "Name")]),
    ];
    let b: Vec<ColumnNode<Value>> = vec![ColumnNode::group(
        "meta",
        "Meta",
        vec![ColumnNode::group("audit", "Audit", vec![ColumnNode::leaf("by", "By")])],
    )];
    let joined: Vec<ColumnNode<Value>> = a.iter().chain(b.iter()).cloned().collect();

    let mut separately = flatten(&a);
    separately.extend(flatten(&b));
    assert_eq!(flatten(&joined), separately);

    let flat: Vec<ColumnNode<Value>> = flatten(&joined).iter().map(|c| c.to_node()).collect();
    assert_eq!(flatten(&flat), flatten(&joined));
}
