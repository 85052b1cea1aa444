//! Query contract shared with the caller: filter object, sort cycle, paging.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys whose displayed value is computed or joined, so the backing store
/// cannot order by them.
pub const UNSORTABLE_KEYS: &[&str] = &["actions", "total", "balance", "lender", "syndicators"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Asc => " ▲",
            Self::Desc => " ▼",
        }
    }
}

/// The caller-owned filter object. `extra` carries caller-defined fields
/// (filter panel values) and survives every engine update untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filter {
    pub search: String,
    pub sort_by: String,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Filter {
    /// Shallow merge of a new search value.
    pub fn with_search(&self, search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..self.clone()
        }
    }

    pub fn sort_order_for(&self, key: &str) -> SortOrder {
        if self.sort_by == key {
            self.sort_order
        } else {
            SortOrder::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub filter: Filter,
    /// 1-based page number.
    pub page: usize,
    pub limit: usize,
}

impl ListQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            filter: Filter::default(),
            page: 1,
            limit: limit.max(1),
        }
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.limit.max(1)).max(1)
    }

    /// Zero-based row offset of the first row on the current page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.limit
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Unsorted → ascending → descending → unsorted. Clicking a different
/// column starts that column at ascending.
pub fn next_sort(filter: &Filter, key: &str) -> Filter {
    let (sort_by, sort_order) = match filter.sort_order_for(key) {
        SortOrder::None => (key.to_string(), SortOrder::Asc),
        SortOrder::Asc => (key.to_string(), SortOrder::Desc),
        SortOrder::Desc => (String::new(), SortOrder::None),
    };
    Filter {
        sort_by,
        sort_order,
        ..filter.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_cycle_three_clicks() {
        let start = Filter {
            search: "abc".to_string(),
            ..Default::default()
        };
        let first = next_sort(&start, "amount");
        assert_eq!((first.sort_by.as_str(), first.sort_order), ("amount", SortOrder::Asc));
        let second = next_sort(&first, "amount");
        assert_eq!((second.sort_by.as_str(), second.sort_order), ("amount", SortOrder::Desc));
        let third = next_sort(&second, "amount");
        assert_eq!((third.sort_by.as_str(), third.sort_order), ("", SortOrder::None));
        assert_eq!(third.search, "abc");
    }

    #[test]
    fn test_sort_switches_column() {
        let sorted = next_sort(&Filter::default(), "name");
        let other = next_sort(&sorted, "amount");
        assert_eq!(other.sort_by, "amount");
        assert_eq!(other.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_filter_serializes_with_wire_names() {
        let mut filter = next_sort(&Filter::default(), "name");
        filter.extra.insert("status".to_string(), "open".to_string());
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "search": "",
                "sortBy": "name",
                "sortOrder": "asc",
                "status": "open"
            })
        );
        let cleared: Filter = serde_json::from_str(r#"{"sortBy":"","sortOrder":""}"#).unwrap();
        assert_eq!(cleared.sort_order, SortOrder::None);
    }

    #[test]
    fn test_query_paging() {
        let mut query = ListQuery::new(10);
        assert_eq!(query.page_count(0), 1);
        assert_eq!(query.page_count(25), 3);
        query.page = 3;
        assert_eq!(query.offset(), 20);
    }
}
