//! Offset/limit windows

/// A skip/take window over an ordered result
///
/// # Example
///
/// ```rust
/// use spec_query::specification::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: usize,
    /// Maximum number of results to return
    pub limit: usize,
}

impl Pagination {
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub const fn first_page(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Window for a 1-indexed page number; page 0 is treated as page 1
    #[must_use]
    pub const fn page(page_number: usize, page_size: usize) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }

    /// Window immediately after this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_zero_is_first_page() {
        assert_eq!(Pagination::page(0, 10), Pagination::first_page(10));
        assert_eq!(Pagination::page(1, 10), Pagination::new(0, 10));
    }

    #[test]
    fn test_next_window() {
        let second = Pagination::first_page(5).next();
        assert_eq!(second, Pagination::page(2, 5));
    }

    #[test]
    fn test_huge_page_saturates() {
        let window = Pagination::page(usize::MAX, 2);
        assert_eq!(window.offset, usize::MAX);
    }
}
