//! Pagination for list endpoints
//!
//! Listings take `?page=N&perPage=M`. Both are optional and out-of-range
//! values are pulled back into range instead of rejected.

use serde::{Deserialize, Serialize};

/// Rows per page when `perPage` is absent
pub const DEFAULT_PER_PAGE: i64 = 100;

/// Upper bound on `perPage`
pub const MAX_PER_PAGE: i64 = 500;

/// `?page=N&perPage=M` query parameters (pages are 1-indexed)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn window(&self, total: i64) -> Pagination {
        Pagination::new(total, self.page, self.per_page)
    }
}

/// The slice of a listing a request asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    /// Rows to skip, for `LIMIT per_page OFFSET offset`
    pub offset: i64,
}

impl Pagination {
    /// Resolve a request against the number of matching rows
    ///
    /// # Examples
    /// ```
    /// use crm_api::pagination::Pagination;
    ///
    /// // 250 rows at 100 per page: the last page holds 50
    /// let p = Pagination::new(250, Some(3), None);
    /// assert_eq!((p.page, p.total_pages, p.offset), (3, 3, 200));
    ///
    /// // A page past the end lands on the last one
    /// let p = Pagination::new(250, Some(9), Some(50));
    /// assert_eq!((p.page, p.total_pages, p.offset), (5, 5, 200));
    /// ```
    pub fn new(total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let total = total.max(0);
        let total_pages = (total + per_page - 1) / per_page;
        let page = page.unwrap_or(1).clamp(1, total_pages.max(1));

        Self {
            page,
            per_page,
            total_pages,
            offset: (page - 1) * per_page,
        }
    }
}

/// One page of a listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages,
            total,
        }
    }
}
