//! Query parameters for the list endpoint

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Page number used when the request carries none
pub const DEFAULT_PAGE: u64 = 1;

/// `?page=&limit=` parameters of the list endpoint
///
/// # Example
///
/// ```rust,ignore
/// use resource_crud::crud::PageQuery;
///
/// let query = PageQuery::default().with_page(3).with_limit(500);
/// assert_eq!(query.page_number(), 3);
/// assert_eq!(query.items_per_page(25, 100), 100);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// Page number (1-indexed). None defaults to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,

    /// Records per page. None defaults to the configured default limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl PageQuery {
    /// Set the page number
    #[must_use]
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Page number, at least 1
    #[must_use]
    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    /// Page size, clamped to `1..=max_limit`
    #[must_use]
    pub fn items_per_page(&self, default_limit: u64, max_limit: u64) -> u64 {
        let max_limit = max_limit.max(1);
        self.limit.unwrap_or(default_limit).clamp(1, max_limit)
    }

    /// Page number and page size under `config`
    #[must_use]
    pub fn resolve(&self, config: &PaginationConfig) -> (u64, u64) {
        (
            self.page_number(),
            self.items_per_page(u64::from(config.default_limit), u64::from(config.max_limit)),
        )
    }
}
