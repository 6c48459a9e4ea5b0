//! Offset pagination shared by list endpoints.
//!
//! Page numbers start at 1. The `(page, limit)` pair is also what list cache
//! keys encode, so two requests collide in the cache only when they ask for
//! exactly the same slice.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Validate and build a page request.
    ///
    /// # Errors
    ///
    /// - `ValidationError::InvalidPage` - `page` is 0
    /// - `ValidationError::InvalidLimit` - `limit` is 0 or above [`MAX_PAGE_LIMIT`]
    pub fn new(page: u32, limit: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage(page));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::InvalidLimit {
                actual: limit,
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items to skip.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    /// Build a page from its items and the total number of matching items.
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let limit = u64::from(request.limit());
        let total_pages = total_items.div_ceil(limit);
        Self {
            items,
            current_page: request.page(),
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            total_items,
        }
    }

    /// Slice an already sorted collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.limit() as usize)
            .collect();
        Self::new(items, request, total)
    }
}
