use serde::Serialize;
use rocket_okapi::okapi::schemars::JsonSchema;

/// Normalized page/limit pair. Pages are 1-based; limit is clamped so a
/// single call cannot pull the whole collection.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        PageParams {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, 100),
        }
    }

    pub fn skip(&self) -> u64 {
        ((self.page - 1) * self.limit) as u64
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: u64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(params: PageParams, total: u64) -> Self {
        Pagination {
            page: params.page,
            limit: params.limit,
            total,
            pages: (total as f64 / params.limit as f64).ceil() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let p = PageParams::new(None, None, 10);
        assert_eq!((p.page, p.limit), (1, 10));

        let p = PageParams::new(Some(0), Some(1000), 10);
        assert_eq!((p.page, p.limit), (1, 100));
    }

    #[test]
    fn skip_is_zero_based() {
        let p = PageParams::new(Some(3), Some(20), 10);
        assert_eq!(p.skip(), 40);
    }

    #[test]
    fn page_count_rounds_up() {
        let p = PageParams::new(Some(1), Some(10), 10);
        assert_eq!(Pagination::new(p, 0).pages, 0);
        assert_eq!(Pagination::new(p, 10).pages, 1);
        assert_eq!(Pagination::new(p, 11).pages, 2);
    }
}
