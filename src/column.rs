//! Column schema: nested column definitions and their flat (leaf) projection.
//!
//! A schema is a tree of [`ColumnNode`]s. Groups only exist to namespace their
//! children; everything downstream (ordering, visibility, widths, rendering)
//! works on the [`FlatColumn`] list produced by [`flatten`].

use ratatui::text::Line;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Renders one cell. Receives the resolved value (if any) and the whole row.
pub type RenderFn<T> = Arc<dyn Fn(Option<&Value>, &T) -> Line<'static> + Send + Sync>;

pub struct LeafColumn<T> {
    pub key: String,
    pub label: String,
    pub render: Option<RenderFn<T>>,
    /// Schema default visibility. `Some(false)` forces the column hidden.
    pub visible: Option<bool>,
}

pub struct ColumnGroup<T> {
    pub key: String,
    pub label: String,
    pub columns: Vec<ColumnNode<T>>,
}

pub enum ColumnNode<T> {
    Leaf(LeafColumn<T>),
    Group(ColumnGroup<T>),
}

impl<T> ColumnNode<T> {
    pub fn leaf(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Leaf(LeafColumn {
            key: key.into(),
            label: label.into(),
            render: None,
            visible: None,
        })
    }

    pub fn group(
        key: impl Into<String>,
        label: impl Into<String>,
        columns: Vec<ColumnNode<T>>,
    ) -> Self {
        Self::Group(ColumnGroup {
            key: key.into(),
            label: label.into(),
            columns,
        })
    }

    /// Attach a cell renderer. No effect on groups.
    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(Option<&Value>, &T) -> Line<'static> + Send + Sync + 'static,
    {
        if let Self::Leaf(leaf) = &mut self {
            leaf.render = Some(Arc::new(render));
        }
        self
    }

    /// Set the schema default visibility. No effect on groups.
    pub fn with_visible(mut self, visible: bool) -> Self {
        if let Self::Leaf(leaf) = &mut self {
            leaf.visible = Some(visible);
        }
        self
    }

    pub fn hidden(self) -> Self {
        self.with_visible(false)
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Leaf(leaf) => &leaf.key,
            Self::Group(group) => &group.key,
        }
    }
}

impl<T> Clone for ColumnNode<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Leaf(leaf) => Self::Leaf(LeafColumn {
                key: leaf.key.clone(),
                label: leaf.label.clone(),
                render: leaf.render.clone(),
                visible: leaf.visible,
            }),
            Self::Group(group) => Self::Group(ColumnGroup {
                key: group.key.clone(),
                label: group.label.clone(),
                columns: group.columns.clone(),
            }),
        }
    }
}

impl<T> fmt::Debug for ColumnNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(leaf) => f
                .debug_struct("Leaf")
                .field("key", &leaf.key)
                .field("label", &leaf.label)
                .field("visible", &leaf.visible)
                .finish(),
            Self::Group(group) => f
                .debug_struct("Group")
                .field("key", &group.key)
                .field("label", &group.label)
                .field("columns", &group.columns)
                .finish(),
        }
    }
}

/// Leaf column after flattening. `key` is unique within a schema.
pub struct FlatColumn<T> {
    pub key: String,
    pub label: String,
    pub render: Option<RenderFn<T>>,
    pub visible: Option<bool>,
}

impl<T> FlatColumn<T> {
    /// True unless the schema explicitly declares the column invisible.
    pub fn default_visible(&self) -> bool {
        self.visible != Some(false)
    }

    /// Convert back into a leaf node (used to compare flat and nested schemas).
    pub fn to_node(&self) -> ColumnNode<T> {
        ColumnNode::Leaf(LeafColumn {
            key: self.key.clone(),
            label: self.label.clone(),
            render: self.render.clone(),
            visible: self.visible,
        })
    }
}

impl<T> Clone for FlatColumn<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            label: self.label.clone(),
            render: self.render.clone(),
            visible: self.visible,
        }
    }
}

impl<T> fmt::Debug for FlatColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatColumn")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("render", &self.render.is_some())
            .field("visible", &self.visible)
            .finish()
    }
}

impl<T> PartialEq for FlatColumn<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.label == other.label && self.visible == other.visible
    }
}

/// Depth-first, order-preserving flattening. Group keys never appear in the
/// output; they only prefix their children (`group.child`).
pub fn flatten<T>(nodes: &[ColumnNode<T>]) -> Vec<FlatColumn<T>> {
    let mut out = Vec::new();
    flatten_into(nodes, "", &mut out);
    out
}

fn flatten_into<T>(nodes: &[ColumnNode<T>], prefix: &str, out: &mut Vec<FlatColumn<T>>) {
    for node in nodes {
        match node {
            ColumnNode::Leaf(leaf) => out.push(FlatColumn {
                key: format!("{prefix}{}", leaf.key),
                label: leaf.label.clone(),
                render: leaf.render.clone(),
                visible: leaf.visible,
            }),
            ColumnNode::Group(group) => {
                let nested = format!("{prefix}{}.", group.key);
                flatten_into(&group.columns, &nested, out);
            }
        }
    }
}

/// Shared, immutable schema. Cloning is cheap and keeps identity, so callers
/// can hand the same schema back every frame without triggering a recompute.
pub struct ColumnSchema<T> {
    nodes: Arc<[ColumnNode<T>]>,
}

impl<T> ColumnSchema<T> {
    pub fn new(nodes: Vec<ColumnNode<T>>) -> Self {
        Self {
            nodes: Arc::from(nodes),
        }
    }

    pub fn nodes(&self) -> &[ColumnNode<T>] {
        &self.nodes
    }

    pub fn flatten(&self) -> Vec<FlatColumn<T>> {
        flatten(&self.nodes)
    }

    pub fn keys(&self) -> Vec<String> {
        self.flatten().into_iter().map(|c| c.key).collect()
    }

    /// Identity comparison: true only for clones of the same schema instance.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }
}

impl<T> Clone for ColumnSchema<T> {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
        }
    }
}

impl<T> fmt::Debug for ColumnSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = ColumnNode<Value>;

    fn keys(cols: &[FlatColumn<Value>]) -> Vec<&str> {
        cols.iter().map(|c| c.key.as_str()).collect()
    }

    fn nested_schema() -> Vec<Node> {
        vec![
            Node::leaf("id", "ID"),
            Node::group(
                "lender",
                "Lender",
                vec![
                    Node::leaf("name", "Name"),
                    Node::group("contact", "Contact", vec![Node::leaf("email", "Email")]),
                ],
            ),
            Node::leaf("amount", "Amount").hidden(),
        ]
    }

    #[test]
    fn test_flatten_prefixes_group_keys() {
        let flat = flatten(&nested_schema());
        assert_eq!(
            keys(&flat),
            vec!["id", "lender.name", "lender.contact.email", "amount"]
        );
        assert_eq!(flat[1].label, "Name");
        assert_eq!(flat[3].visible, Some(false));
        assert!(!flat[3].default_visible());
        assert!(flat[0].default_visible());
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_schema() {
        let flat = flatten(&nested_schema());
        let as_nodes: Vec<Node> = flat.iter().map(|c| c.to_node()).collect();
        let again = flatten(&as_nodes);
        assert_eq!(flat, again);
    }

    #[test]
    fn test_flatten_distributes_over_concatenation() {
        let a = nested_schema();
        let b = vec![
            Node::leaf("status", "Status"),
            Node::group("meta", "Meta", vec![Node::leaf("created", "Created")]),
        ];
        let mut joined = a.clone();
        joined.extend(b.iter().cloned());

        let mut separately = flatten(&a);
        separately.extend(flatten(&b));
        assert_eq!(flatten(&joined), separately);
    }

    #[test]
    fn test_empty_group_contributes_nothing() {
        let schema = vec![Node::group("empty", "Empty", vec![]), Node::leaf("a", "A")];
        assert_eq!(keys(&flatten(&schema)), vec!["a"]);
    }

    #[test]
    fn test_render_is_carried_to_flat_column() {
        let schema = vec![Node::leaf("amount", "Amount").with_render(|v, _row| {
            Line::from(format!("${}", v.map(|v| v.to_string()).unwrap_or_default()))
        })];
        let flat = flatten(&schema);
        let render = flat[0].render.as_ref().expect("render should be kept");
        let line = render(Some(&Value::from(12)), &Value::Null);
        assert_eq!(line.to_string(), "$12");
    }

    #[test]
    fn test_schema_identity() {
        let schema = ColumnSchema::new(nested_schema());
        let same = schema.clone();
        let other = ColumnSchema::new(nested_schema());
        assert!(schema.same_as(&same));
        assert!(!schema.same_as(&other));
        assert_eq!(schema.keys(), other.keys());
    }
}
