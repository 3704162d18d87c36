use serde::Serialize;

pub const BOOKS_PER_PAGE: i64 = 12;
pub const CELEBRITIES_PER_PAGE: i64 = 12;

/// One page of results, as returned to clients.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub current_page: i64,
    pub number_of_pages: i64,
}

/// Position of a page inside a result set of fixed-size pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Missing or non-positive pages fall back to the first one.
    pub fn new(page: Option<i64>, page_size: i64) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };

        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Never less than one, even for an empty result set.
    pub fn number_of_pages(&self, total: i64) -> i64 {
        let pages = (total + self.page_size - 1) / self.page_size;
        pages.max(1)
    }

    pub fn wrap<T>(&self, results: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            results,
            current_page: self.page,
            number_of_pages: self.number_of_pages(total),
        }
    }
}
