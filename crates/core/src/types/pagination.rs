//! Page/limit pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Pagination query parameters (`?page=2&limit=20`).
///
/// Missing values fall back to page 1 and 20 items. Out-of-range values are
/// clamped rather than rejected, matching what list clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "Pagination::default_page")]
    pub page: i64,
    #[serde(default = "Pagination::default_limit")]
    pub limit: i64,
}

impl Pagination {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 20;
    /// Largest page size a client may request.
    pub const MAX_LIMIT: i64 = 100;

    const fn default_page() -> i64 {
        1
    }

    const fn default_limit() -> i64 {
        Self::DEFAULT_LIMIT
    }

    /// Build a normalized pagination from raw values.
    #[must_use]
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }.normalized()
    }

    /// Clamp `page` to at least 1 and `limit` to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Row offset for SQL `OFFSET`.
    #[must_use]
    pub fn offset(self) -> i64 {
        let p = self.normalized();
        (p.page - 1).saturating_mul(p.limit)
    }

    /// Response metadata for this page.
    #[must_use]
    pub fn info(self, total: i64) -> PageInfo {
        let p = self.normalized();
        PageInfo {
            page: p.page,
            limit: p.limit,
            total,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Pagination block returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_query_is_empty() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p, Pagination::default());
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(3, 20).offset(), 40);
        assert_eq!(Pagination::new(2, 5).offset(), 5);
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let p = Pagination::new(0, 1000);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, Pagination::MAX_LIMIT);

        let p = Pagination::new(-4, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn test_info_reports_normalized_values() {
        let info = Pagination { page: 0, limit: 500 }.info(42);
        assert_eq!(
            info,
            PageInfo {
                page: 1,
                limit: 100,
                total: 42
            }
        );
    }
}
