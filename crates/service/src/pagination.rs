//! Pagination utilities for service layer
//!
//! Limit/offset parameters arrive as raw query strings; `Pagination::from_query`
//! applies the same leniency as the REST API: a missing, non-numeric or
//! non-positive limit falls back to the default, and a bad offset becomes zero.

/// Page-size bounds, usually taken from the `[pagination]` config section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSettings {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PageSettings {
    fn default() -> Self { Self { default_limit: 10, max_limit: 100 } }
}

impl From<&configs::PaginationSettings> for PageSettings {
    fn from(p: &configs::PaginationSettings) -> Self {
        Self { default_limit: p.default_limit, max_limit: p.max_limit }
    }
}

/// Largest value SQL `LIMIT`/`OFFSET` accept as a signed 64-bit bind.
pub const MAX_SQL_BOUND: u64 = i64::MAX as u64;

/// Pagination parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// rows per page, always within `1..=max_limit`
    pub limit: u64,
    /// rows skipped
    pub offset: u64,
}

impl Pagination {
    pub fn from_query(limit: Option<&str>, offset: Option<&str>, settings: PageSettings) -> Self {
        let limit = limit
            .and_then(|l| l.trim().parse::<u64>().ok())
            .filter(|l| *l > 0)
            .map(|l| l.min(settings.max_limit))
            .unwrap_or(settings.default_limit)
            .min(MAX_SQL_BOUND);
        let offset = offset
            .and_then(|o| o.trim().parse::<u64>().ok())
            .unwrap_or(0)
            .min(MAX_SQL_BOUND);
        Self { limit, offset }
    }

    /// Slice bounds for an in-memory collection of `len` rows.
    pub fn window(&self, len: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(usize::try_from(self.limit).unwrap_or(usize::MAX)).min(len);
        start..end
    }
}

impl Default for Pagination {
    fn default() -> Self { Self { limit: 10, offset: 0 } }
}

/// One page of rows plus the total row count.
#[derive(Clone, Debug, PartialEq)]
pub struct Paged<T> {
    pub count: u64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged { count: self.count, items: self.items.into_iter().map(f).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::{PageSettings, Pagination, MAX_SQL_BOUND};

    fn parse(limit: Option<&str>, offset: Option<&str>) -> Pagination {
        Pagination::from_query(limit, offset, PageSettings::default())
    }

    #[test]
    fn missing_params_use_defaults() {
        assert_eq!(parse(None, None), Pagination { limit: 10, offset: 0 });
    }

    #[test]
    fn invalid_limit_falls_back_to_default() {
        assert_eq!(parse(Some("0"), None).limit, 10);
        assert_eq!(parse(Some("-3"), None).limit, 10);
        assert_eq!(parse(Some("abc"), None).limit, 10);
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(parse(Some("1000"), None).limit, 100);
        let s = PageSettings { default_limit: 5, max_limit: 20 };
        assert_eq!(Pagination::from_query(Some("50"), None, s).limit, 20);
    }

    #[test]
    fn invalid_offset_becomes_zero() {
        assert_eq!(parse(None, Some("-1")).offset, 0);
        assert_eq!(parse(None, Some("x")).offset, 0);
        assert_eq!(parse(None, Some("30")).offset, 30);
    }

    #[test]
    fn huge_values_stay_within_sql_range() {
        assert_eq!(parse(None, Some("18446744073709551615")).offset, MAX_SQL_BOUND);
        assert_eq!(parse(None, Some("9223372036854775807")).offset, MAX_SQL_BOUND);
        let s = PageSettings { default_limit: u64::MAX, max_limit: u64::MAX };
        let p = Pagination::from_query(Some("18446744073709551615"), None, s);
        assert_eq!(p.limit, MAX_SQL_BOUND);
        assert_eq!(Pagination::from_query(None, None, s).limit, MAX_SQL_BOUND);
    }

    #[test]
    fn window_clamps_to_len() {
        let p = Pagination { limit: 10, offset: 20 };
        assert_eq!(p.window(25), 20..25);
        assert_eq!(p.window(5), 5..5);
    }
}
