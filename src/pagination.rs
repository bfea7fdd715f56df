use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams { pub page: Option<u32>, pub per_page: Option<u32> }

/// Normalized page window: `page >= 1`, `1 <= per_page <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub fn limit(&self) -> i64 { self.per_page as i64 }
    pub fn offset(&self) -> i64 { (self.page as i64 - 1) * self.per_page as i64 }
}

impl From<PageParams> for Page {
    fn from(p: PageParams) -> Self {
        Self { page: p.page.unwrap_or(1).max(1), per_page: p.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE) }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}
