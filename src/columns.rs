//! Live column order, visibility and widths, reconciled with the schema and
//! persisted through [`Preferences`].
//!
//! The schema is always the source of truth for which columns exist:
//! persisted keys that no longer exist are dropped, new schema keys are
//! appended, and a schema-level `visible: false` beats any stored "visible".

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, trace};

use crate::column::{ColumnSchema, FlatColumn};
use crate::gesture::array_move;
use crate::layout;
use crate::persistence::{Preferences, StoredVisibility};

/// Persisted (or requested) order reconciled against the schema keys:
/// unknown keys and duplicates are dropped, missing keys are appended in
/// schema order. The result is always a permutation of `schema_keys`.
pub fn merge_order(persisted: Option<&[String]>, schema_keys: &[String]) -> Vec<String> {
    let known: HashSet<&str> = schema_keys.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(schema_keys.len());

    for key in persisted.unwrap_or_default() {
        if known.contains(key.as_str()) && seen.insert(key.as_str()) {
            order.push(key.clone());
        }
    }
    for key in schema_keys {
        if seen.insert(key.as_str()) {
            order.push(key.clone());
        }
    }
    order
}

/// Default-visible keys plus persisted visible keys, minus every key the
/// schema forces invisible. Keys the user hid stay hidden unless they are
/// also listed as visible.
pub fn merge_visibility<T>(
    columns: &[FlatColumn<T>],
    persisted: Option<&StoredVisibility>,
) -> BTreeSet<String> {
    let (visible, hidden): (HashSet<&str>, HashSet<&str>) = match persisted {
        Some(p) => (
            p.visible.iter().map(String::as_str).collect(),
            p.hidden.iter().map(String::as_str).collect(),
        ),
        None => Default::default(),
    };
    columns
        .iter()
        .filter(|c| c.default_visible())
        .filter(|c| !hidden.contains(c.key.as_str()) || visible.contains(c.key.as_str()))
        .map(|c| c.key.clone())
        .collect()
}

pub struct ColumnManager<T> {
    schema: ColumnSchema<T>,
    columns: Vec<FlatColumn<T>>,
    order: Vec<String>,
    visible: BTreeSet<String>,
    widths: BTreeMap<String, u32>,
    default_width: u32,
    min_width: u32,
    prefs: Preferences,
}

impl<T> ColumnManager<T> {
    pub fn new(schema: ColumnSchema<T>, prefs: Preferences) -> Self {
        Self::with_widths(
            schema,
            prefs,
            layout::TABLE_COLUMN_WIDTH,
            layout::TABLE_COLUMN_MIN_WIDTH,
        )
    }

    pub fn with_widths(
        schema: ColumnSchema<T>,
        prefs: Preferences,
        default_width: u32,
        min_width: u32,
    ) -> Self {
        let columns = schema.flatten();
        let keys: Vec<String> = columns.iter().map(|c| c.key.clone()).collect();

        let stored_order = prefs.load_order();
        let order = merge_order(stored_order.as_deref(), &keys);
        log_dropped("order", stored_order.as_deref(), &keys);

        let stored_visible = prefs.load_visibility();
        let visible = merge_visibility(&columns, stored_visible.as_ref());
        log_dropped(
            "visibility",
            stored_visible.as_ref().map(|v| v.visible.as_slice()),
            &keys,
        );

        let min_width = min_width.max(1);
        let widths = prefs
            .load_widths()
            .unwrap_or_default()
            .into_iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(k, w)| (k, w.max(min_width)))
            .collect();

        Self {
            schema,
            columns,
            order,
            visible,
            widths,
            default_width: default_width.max(min_width),
            min_width,
            prefs,
        }
    }

    pub fn schema(&self) -> &ColumnSchema<T> {
        &self.schema
    }

    /// Re-reconcile against a new schema. A clone of the current schema is a
    /// no-op, so callers may pass the schema on every frame.
    pub fn set_schema(&mut self, schema: ColumnSchema<T>) {
        if self.schema.same_as(&schema) {
            return;
        }
        self.columns = schema.flatten();
        self.schema = schema;
        let keys = self.keys();

        let order = merge_order(Some(&self.order), &keys);
        let current = self.stored_visibility();
        let visible = merge_visibility(&self.columns, Some(&current));
        self.widths.retain(|k, _| keys.contains(k));
        debug!(columns = keys.len(), "schema changed, columns reconciled");

        self.replace_order(order);
        self.replace_visible(visible);
    }

    fn keys(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.key.clone()).collect()
    }

    fn find(&self, key: &str) -> Option<&FlatColumn<T>> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Unknown keys are ignored.
    pub fn toggle_column(&mut self, key: &str, visible: bool) {
        if self.find(key).is_none() {
            return;
        }
        let mut next = self.visible.clone();
        if visible {
            next.insert(key.to_string());
        } else {
            next.remove(key);
        }
        self.replace_visible(next);
    }

    pub fn show_all_columns(&mut self) {
        let all = self.keys().into_iter().collect();
        self.replace_visible(all);
    }

    pub fn hide_all_columns(&mut self) {
        self.replace_visible(BTreeSet::new());
    }

    /// Accepts any list; it is sanitized into a permutation of the schema keys.
    pub fn set_column_order(&mut self, order: &[String]) {
        let keys = self.keys();
        self.replace_order(merge_order(Some(order), &keys));
    }

    /// Move `active` to the position of `over` (remove + insert). Returns
    /// whether the order changed.
    pub fn move_column(&mut self, active: &str, over: &str) -> bool {
        if active == over {
            return false;
        }
        let from = self.order.iter().position(|k| k == active);
        let to = self.order.iter().position(|k| k == over);
        match (from, to) {
            (Some(from), Some(to)) => {
                let mut order = self.order.clone();
                array_move(&mut order, from, to);
                self.set_column_order(&order);
                true
            }
            _ => false,
        }
    }

    /// Columns to render, in order. While customizing with `show_unselected`,
    /// hidden columns are included so they can be re-enabled.
    pub fn ordered_columns(
        &self,
        show_controls: bool,
        show_unselected: bool,
    ) -> Vec<&FlatColumn<T>> {
        let include_hidden = show_controls && show_unselected;
        self.order
            .iter()
            .filter_map(|key| self.find(key))
            .filter(|c| include_hidden || self.visible.contains(&c.key))
            .collect()
    }

    /// The full catalogue in schema order.
    pub fn all_columns(&self) -> &[FlatColumn<T>] {
        &self.columns
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn visible_keys(&self) -> &BTreeSet<String> {
        &self.visible
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visible.contains(key)
    }

    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    pub fn column_width(&self, key: &str) -> u32 {
        self.widths
            .get(key)
            .copied()
            .unwrap_or(self.default_width)
            .max(self.min_width)
    }

    /// Clamped to the minimum width. Returns the stored width.
    pub fn set_column_width(&mut self, key: &str, width: u32) -> u32 {
        let width = width.max(self.min_width);
        if self.find(key).is_none() {
            return width;
        }
        if self.widths.get(key) != Some(&width) {
            trace!(key, width, "column width");
            self.widths.insert(key.to_string(), width);
            self.prefs.save_widths(&self.widths);
        }
        width
    }

    pub fn visible_widths(&self, keys: &[&str]) -> Vec<u32> {
        keys.iter().map(|k| self.column_width(k)).collect()
    }

    /// Run the auto-fill pass over the given rendered columns and keep the
    /// stretched width of the last one.
    pub fn auto_fill(&mut self, keys: &[&str], container: u32) -> Vec<u32> {
        let filled = layout::auto_fill(&self.visible_widths(keys), container);
        if let (Some(last), Some(&width)) = (keys.last(), filled.last()) {
            if width != self.column_width(last) {
                self.set_column_width(last, width);
            }
        }
        filled
    }

    /// Drop all stored preferences and return to schema defaults.
    pub fn reset(&mut self) {
        self.prefs.reset();
        self.order = self.keys();
        self.visible = merge_visibility(&self.columns, None);
        self.widths.clear();
        debug!("column preferences reset");
    }

    fn replace_order(&mut self, order: Vec<String>) {
        if order != self.order {
            trace!(?order, "column order");
            self.order = order;
            self.prefs.save_order(&self.order);
        }
    }

    fn replace_visible(&mut self, visible: BTreeSet<String>) {
        if visible != self.visible {
            self.visible = visible;
            let stored = self.stored_visibility();
            trace!(visible = ?stored.visible, "visible columns");
            self.prefs.save_visibility(&stored);
        }
    }

    /// Visible and hidden keys in display order.
    fn stored_visibility(&self) -> StoredVisibility {
        let (visible, hidden) = self
            .order
            .iter()
            .cloned()
            .partition(|k| self.visible.contains(k));
        StoredVisibility { visible, hidden }
    }
}

fn log_dropped(slice: &str, stored: Option<&[String]>, keys: &[String]) {
    let dropped: Vec<&String> = stored
        .unwrap_or_default()
        .iter()
        .filter(|k| !keys.contains(k))
        .collect();
    if !dropped.is_empty() {
        debug!(slice, ?dropped, "stored column keys no longer in schema");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnNode;
    use crate::persistence::{MemoryStore, StorageKeys};
    use serde_json::Value;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn schema() -> ColumnSchema<Value> {
        ColumnSchema::new(vec![
            ColumnNode::leaf("name", "Name"),
            ColumnNode::leaf("amount", "Amount"),
            ColumnNode::leaf("status", "Status").hidden(),
        ])
    }

    fn manager(store: &MemoryStore) -> ColumnManager<Value> {
        let prefs = Preferences::new(Box::new(store.clone()), StorageKeys::for_view("t"));
        ColumnManager::new(schema(), prefs)
    }

    fn rendered(m: &ColumnManager<Value>, controls: bool, unselected: bool) -> Vec<String> {
        m.ordered_columns(controls, unselected)
            .iter()
            .map(|c| c.key.clone())
            .collect()
    }

    #[test]
    fn test_merge_order_drops_foreign_and_appends_new() {
        let schema_keys = keys(&["a", "b", "c", "d"]);
        let merged = merge_order(Some(&keys(&["c", "ghost", "a", "c"])), &schema_keys);
        assert_eq!(merged, keys(&["c", "a", "b", "d"]));
        assert_eq!(merge_order(None, &schema_keys), schema_keys);
    }

    #[test]
    fn test_merge_order_is_always_a_permutation() {
        let schema_keys = keys(&["a", "b", "c"]);
        let inputs = [
            keys(&[]),
            keys(&["c", "c", "c"]),
            keys(&["x", "y"]),
            keys(&["b", "a", "c", "a", "z"]),
        ];
        for input in inputs {
            let mut merged = merge_order(Some(&input), &schema_keys);
            merged.sort();
            assert_eq!(merged, schema_keys);
        }
    }

    #[test]
    fn test_schema_hidden_beats_persisted_visible() {
        let store = MemoryStore::new();
        store.insert("t.visibleColumns", r#"["status"]"#);
        let m = manager(&store);
        assert!(!m.is_visible("status"));
        assert!(m.is_visible("name"));
        assert!(m.is_visible("amount"));
    }

    #[test]
    fn test_user_hidden_column_stays_hidden_after_reload() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.toggle_column("amount", false);
        let reloaded = manager(&store);
        assert!(!reloaded.is_visible("amount"));
        assert!(reloaded.is_visible("name"));
    }

    #[test]
    fn test_toggle_and_show_hide_all() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.toggle_column("name", false);
        assert_eq!(rendered(&m, false, false), keys(&["amount"]));
        m.toggle_column("ghost", true);
        assert!(!m.is_visible("ghost"));
        m.show_all_columns();
        assert_eq!(rendered(&m, false, false), keys(&["name", "amount", "status"]));
        m.hide_all_columns();
        assert!(rendered(&m, false, false).is_empty());
        // hidden columns stay listed while customizing with show-unselected
        assert_eq!(rendered(&m, true, true), keys(&["name", "amount", "status"]));
        assert!(rendered(&m, true, false).is_empty());
    }

    #[test]
    fn test_changes_are_persisted() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.set_column_order(&keys(&["amount", "name"]));
        m.toggle_column("name", false);
        m.set_column_width("amount", 40);

        let reloaded = manager(&store);
        assert_eq!(reloaded.order(), keys(&["amount", "name", "status"]).as_slice());
        assert_eq!(reloaded.column_width("amount"), 100);
        assert_eq!(reloaded.column_width("name"), 200);
    }

    #[test]
    fn test_move_column_uses_array_move() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        assert!(m.move_column("name", "status"));
        assert_eq!(m.order(), keys(&["amount", "status", "name"]).as_slice());
        assert!(!m.move_column("amount", "amount"));
        assert!(!m.move_column("amount", "ghost"));
    }

    #[test]
    fn test_auto_fill_persists_stretched_width() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        let filled = m.auto_fill(&["name", "amount"], 600);
        assert_eq!(filled, vec![200, 400]);
        assert_eq!(m.column_width("amount"), 400);
        let before = store.get("t.columnWidths");
        assert_eq!(m.auto_fill(&["name", "amount"], 600), vec![200, 400]);
        assert_eq!(store.get("t.columnWidths"), before);
    }

    #[test]
    fn test_set_schema_same_instance_is_noop() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.set_schema(m.schema().clone());
        assert!(store.is_empty());

        m.set_schema(ColumnSchema::new(vec![
            ColumnNode::leaf("amount", "Amount"),
            ColumnNode::leaf("created", "Created"),
        ]));
        assert_eq!(m.order(), keys(&["amount", "created"]).as_slice());
        assert!(m.is_visible("created"));
        assert!(!m.is_visible("name"));
    }

    #[test]
    fn test_reset_returns_to_defaults() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.set_column_order(&keys(&["status", "amount"]));
        m.hide_all_columns();
        m.reset();
        assert!(store.is_empty());
        assert_eq!(rendered(&m, false, false), keys(&["name", "amount"]));
    }
}
