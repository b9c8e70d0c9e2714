//! Response envelopes for the list and delete endpoints

use serde::Serialize;
use url::Url;

use crate::entity::RecordId;

/// Paginated list envelope: `{page, limit, total, data, prev, next}`
///
/// `prev` and `next` are always present in the serialized form, `null` when
/// there is no such page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    /// Current page (1-indexed)
    pub page: u64,
    /// Page size
    pub limit: u64,
    /// Visible records overall
    pub total: u64,
    /// Projected records of this page
    pub data: Vec<T>,
    /// Link to the previous page
    pub prev: Option<String>,
    /// Link to the next page
    pub next: Option<String>,
}

impl<T> PageResult<T> {
    /// Envelope without links
    pub fn new(page: u64, limit: u64, total: u64, data: Vec<T>) -> Self {
        Self {
            page,
            limit,
            total,
            data,
            prev: None,
            next: None,
        }
    }

    /// Whether a page follows this one; never for a zero `limit`
    pub fn has_next(&self) -> bool {
        self.limit > 0 && self.page.saturating_mul(self.limit) < self.total
    }

    /// Whether a previous page should be linked; never from page 0 or 1
    pub fn has_prev(&self) -> bool {
        !self.data.is_empty() && self.page > 1
    }

    /// Fill `prev` / `next` from `base` with its query replaced by `page` and `limit`
    #[must_use]
    pub fn with_links(mut self, base: &Url) -> Self {
        self.next = self
            .has_next()
            .then(|| page_link(base, self.page.saturating_add(1), self.limit));
        self.prev = self
            .has_prev()
            .then(|| page_link(base, self.page.saturating_sub(1), self.limit));
        self
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether this page holds no records
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// `base` with its query replaced by `page` and `limit`
pub fn page_link(base: &Url, page: u64, limit: u64) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("limit", &limit.to_string());
    url.to_string()
}

/// Delete endpoint body: `{message, id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    /// Resolved success message
    pub message: String,
    /// Deleted record id
    pub id: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("http://localhost:8080/widgets/?page=9&limit=3&foo=bar").unwrap()
    }

    #[test]
    fn test_exact_fill_has_no_next() {
        let page = PageResult::new(1, 25, 25, vec![0; 25]).with_links(&base());
        assert!(page.next.is_none());
        assert!(page.prev.is_none());
    }

    #[test]
    fn test_one_more_record_links_next_page() {
        let page = PageResult::new(1, 25, 26, vec![0; 25]).with_links(&base());
        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost:8080/widgets/?page=2&limit=25")
        );
    }

    #[test]
    fn test_last_partial_page_links_prev_only() {
        let page = PageResult::new(2, 10, 15, vec![0; 5]).with_links(&base());
        assert!(page.next.is_none());
        assert_eq!(
            page.prev.as_deref(),
            Some("http://localhost:8080/widgets/?page=1&limit=10")
        );
    }

    #[test]
    fn test_empty_page_past_the_end_has_no_prev() {
        let page = PageResult::<u8>::new(5, 10, 15, Vec::new()).with_links(&base());
        assert!(page.prev.is_none());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_zero_page_or_limit_never_links() {
        let zero_page = PageResult::new(0, 10, 15, vec![0; 10]).with_links(&base());
        assert!(zero_page.prev.is_none());
        let zero_limit = PageResult::<u8>::new(1, 0, 15, Vec::new()).with_links(&base());
        assert!(zero_limit.next.is_none());
    }

    #[test]
    fn test_serializes_null_links() {
        let page = PageResult::new(1, 25, 1, vec![json!({"id": 1})]);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(
            value,
            json!({"page": 1, "limit": 25, "total": 1, "data": [{"id": 1}], "prev": null, "next": null})
        );
    }

    #[test]
    fn test_delete_response_shape() {
        let body = DeleteResponse {
            message: "Widget deleted".to_string(),
            id: 4,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"message": "Widget deleted", "id": 4})
        );
    }
}
