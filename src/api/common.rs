//! Common API utilities and shared types

use serde::Deserialize;

use crate::models::ListParams;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for public APIs
pub fn default_per_page() -> u32 {
    10
}

/// Pagination query parameters (`?page=&per_page=`)
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageQuery {
    /// Clamped list parameters
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamping() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.params(), ListParams::new(1, 10));

        let query = PageQuery { page: 0, per_page: 1000 };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }
}
