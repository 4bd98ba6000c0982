//! Offset paging for listings

use crate::{Category, Event, Participant, Review, UserProfile};
use serde::Serialize;
use utoipa::ToSchema;

/// Upper bound for a requested page size
pub const MAX_PAGE_SIZE: i64 = 50;

/// Page size used when the client sends none or a non-positive one
pub const DEFAULT_PAGE_SIZE: i64 = MAX_PAGE_SIZE;

/// Resolved paging window (1-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    page: i64,
    limit: i64,
    offset: i64,
}

impl Paging {
    /// Normalise raw query values.
    ///
    /// The size is clamped to [`MAX_PAGE_SIZE`]; a missing or non-positive
    /// page resolves to page 1 with offset 0.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let limit = match page_size {
            Some(size) if size > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
            Some(size) if size > 0 => size,
            _ => DEFAULT_PAGE_SIZE,
        };

        let page = match page {
            Some(p) if p > 0 => p,
            _ => 1,
        };

        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total matching the same filter
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    EventPage = Page<Event>,
    UserPage = Page<UserProfile>,
    ParticipantPage = Page<Participant>,
    ReviewPage = Page<Review>,
    CategoryPage = Page<Category>
)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, paging: &Paging) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + paging.limit() - 1) / paging.limit()
        };
        Self {
            items,
            total,
            page: paging.page(),
            page_size: paging.limit(),
            total_pages,
        }
    }
}
