//! Offset-based pagination types shared by all listing endpoints.
//!
//! # Usage
//!
//! ```rust,ignore
//! let window = PageRequest { page: Some(0), size: Some(20) }.validate();
//! let page = service.page(filter, sort, window).await?;
//! ```

use serde::{Deserialize, Serialize};

/// Raw pagination input as bound by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: Option<u32>,
    /// Page size (1-100, default 20).
    pub size: Option<u32>,
}

impl PageRequest {
    /// Apply defaults and bounds.
    pub fn validate(&self) -> PageWindow {
        let page = self.page.unwrap_or(0);
        let size = self.size.unwrap_or(20).clamp(1, 100);
        PageWindow { page, size }
    }
}

/// Validated and normalized pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub size: u32,
}

impl PageWindow {
    /// Index of the first item in the window.
    pub fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

/// One page of results with totals, as the listing endpoints return it.
#[derive(Debug, Clone, Serialize)]
pub struct PageDto<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> PageDto<T> {
    /// Slice `items` (already filtered and sorted in full) to the window.
    pub fn from_sorted(items: Vec<T>, window: PageWindow) -> Self {
        let total_elements = items.len() as u64;
        let total_pages = total_elements.div_ceil(window.size as u64) as u32;
        let items = items
            .into_iter()
            .skip(window.offset())
            .take(window.size as usize)
            .collect();
        PageDto {
            items,
            page: window.page,
            size: window.size,
            total_elements,
            total_pages,
        }
    }
}
