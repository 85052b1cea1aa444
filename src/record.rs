//! Row value access by flat column key.

use serde_json::Value;

/// A row the grid can display. Keys are flat column keys (`group.child`).
pub trait Record {
    fn value(&self, key: &str) -> Option<Value>;
}

impl Record for Value {
    /// Exact key first (`{"a.b": 1}`), then the dot path (`{"a": {"b": 1}}`).
    fn value(&self, key: &str) -> Option<Value> {
        let obj = self.as_object()?;
        if let Some(v) = obj.get(key) {
            return Some(v.clone());
        }
        let mut current = self;
        for part in key.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }
}

/// Text shown in a cell when the column has no render function.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
