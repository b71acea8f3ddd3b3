//! Page of results with navigation metadata.

use serde::Serialize;

use crate::connection::Row;

/// Rows per page when the caller asks for fewer than one.
pub const DEFAULT_PER_PAGE: u64 = 15;

/// One page of a select, as returned by
/// [`Builder::paginate`](crate::Builder::paginate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginator {
    /// Rows matching the select, over all pages.
    pub total: u64,
    /// Page size.
    pub per_page: u64,
    /// This page, starting at 1.
    pub current_page: u64,
    /// Last page, at least 1.
    pub last_page: u64,
    /// Following page, if any row lies beyond this one.
    pub next_page: Option<u64>,
    /// Preceding page, if this is not the first.
    pub previous_page: Option<u64>,
    /// Rows of this page.
    pub items: Vec<Row>,
}

impl Paginator {
    /// Builds the navigation fields. Out-of-range inputs are normalized:
    /// a page below 1 becomes 1 and a page size below 1 becomes
    /// [`DEFAULT_PER_PAGE`].
    #[must_use]
    pub fn new(total: u64, per_page: u64, current_page: u64, items: Vec<Row>) -> Self {
        let (per_page, current_page) = normalize(per_page, current_page);
        Self {
            total,
            per_page,
            current_page,
            last_page: total.div_ceil(per_page).max(1),
            next_page: if current_page.saturating_mul(per_page) < total {
                current_page.checked_add(1)
            } else {
                None
            },
            previous_page: (current_page > 1).then(|| current_page - 1),
            items,
        }
    }

    /// True when this page holds no row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// `(per_page, page)` with the defaults applied.
#[must_use]
pub fn normalize(per_page: u64, page: u64) -> (u64, u64) {
    let per_page = if per_page < 1 { DEFAULT_PER_PAGE } else { per_page };
    (per_page, page.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page() {
        let page = Paginator::new(31, 10, 2, Vec::new());
        assert_eq!(page.last_page, 4);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page = Paginator::new(2, 1, 2, Vec::new());
        assert_eq!(page.last_page, 2);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn test_huge_page_has_no_next() {
        let page = Paginator::new(40, 10, u64::MAX, Vec::new());
        assert_eq!(page.current_page, u64::MAX);
        assert_eq!(page.last_page, 4);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(u64::MAX - 1));

        let page = Paginator::new(u64::MAX, u64::MAX, 1, Vec::new());
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_defaults_applied() {
        let page = Paginator::new(0, 0, 0, Vec::new());
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.last_page, 1);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, None);
        assert!(page.is_empty());
    }

    #[test]
    fn test_serializes_items_as_maps() {
        let row: Row = [("id", crate::SqlValue::Int(1))].into_iter().collect();
        let json = serde_json::to_value(Paginator::new(1, 15, 1, vec![row])).unwrap();
        assert_eq!(json["items"][0]["id"], 1);
        assert_eq!(json["next_page"], serde_json::Value::Null);
    }
}
