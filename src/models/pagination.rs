use serde::{Deserialize, Serialize};
use validator::Validate;

/// One page of a listing plus the numbers needed to render a pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
    /// 1-based position of the first item on this page
    pub from: Option<u64>,
    /// 1-based position of the last item on this page
    pub to: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, current_page: u32, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(u64::from(per_page)).max(1);
        let offset = u64::from(current_page.saturating_sub(1)) * u64::from(per_page);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + data.len() as u64))
        };

        Self {
            data,
            current_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            per_page,
            total,
            from,
            to,
        }
    }
}

fn default_page() -> u32 {
    1
}

/// Filters accepted by the record listing.
///
/// Dates are `YYYY-MM-DD` in the configured time zone and both bounds are
/// inclusive. Serialized form feeds the cache key, so field names are part
/// of the key format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TimeRecordFilters {
    #[serde(default)]
    pub user_id: Option<i32>,

    /// Only records of this manager's direct reports
    #[serde(default)]
    pub manager_id: Option<i32>,

    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    /// Case-insensitive match on employee name or position
    #[serde(default)]
    #[validate(length(max = 100, message = "search may be at most 100 characters"))]
    pub search: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
}

impl Default for TimeRecordFilters {
    fn default() -> Self {
        Self {
            user_id: None,
            manager_id: None,
            start_date: None,
            end_date: None,
            search: None,
            page: default_page(),
        }
    }
}

impl TimeRecordFilters {
    /// Blank strings mean "no filter"; trimmed so equivalent requests share a key.
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.start_date = clean(self.start_date);
        self.end_date = clean(self.end_date);
        self.search = clean(self.search);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::new(vec![1, 2, 3, 4, 5], 23, 2, 5);
        assert_eq!(page.last_page, 5);
        assert_eq!(page.from, Some(6));
        assert_eq!(page.to, Some(10));

        let last = Page::new(vec![21, 22, 23], 23, 5, 5);
        assert_eq!(last.from, Some(21));
        assert_eq!(last.to, Some(23));
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i32> = Page::new(Vec::new(), 0, 1, 15);
        assert_eq!(page.last_page, 1);
        assert_eq!(page.from, None);
        assert_eq!(page.to, None);
    }

    #[test]
    fn test_filters_default_to_first_page() {
        let filters: TimeRecordFilters = serde_json::from_str("{}").unwrap();
        assert_eq!(filters, TimeRecordFilters::default());
        assert_eq!(filters.page, 1);
    }

    #[test]
    fn test_filters_validation() {
        let filters = TimeRecordFilters {
            page: 0,
            search: Some("x".repeat(101)),
            ..Default::default()
        };
        let errors = filters.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("page"));
        assert!(fields.contains_key("search"));
    }

    #[test]
    fn test_normalized_drops_blank_strings() {
        let filters = TimeRecordFilters {
            search: Some("  ana ".to_string()),
            start_date: Some("".to_string()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(filters.search.as_deref(), Some("ana"));
        assert_eq!(filters.start_date, None);
    }
}
