//! Page-number pagination.
//!
//! Pages are 1-indexed and fixed-size. Resolving a requested page never fails:
//! a missing or non-numeric value means the first page, and a number outside
//! `1..=num_pages` means the last page. An empty collection still has a single
//! empty page.

use std::num::NonZeroU32;

use serde::Serialize;

/// The raw `?page=` value as the client sent it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageRequest {
    #[default]
    First,
    Number(i64),
}

impl PageRequest {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|value| value.parse::<i64>().ok()) {
            Some(number) => Self::Number(number),
            None => Self::First,
        }
    }
}

/// Offset/limit pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.get()
    }

    pub fn num_pages(&self, total_count: u64) -> u64 {
        if total_count == 0 {
            return 1;
        }
        total_count.div_ceil(u64::from(self.per_page.get()))
    }

    /// Resolve the requested page against the collection size.
    pub fn resolve(&self, request: PageRequest, total_count: u64) -> u64 {
        let num_pages = self.num_pages(total_count);
        match request {
            PageRequest::First => 1,
            PageRequest::Number(number) if number >= 1 && (number as u64) <= num_pages => {
                number as u64
            }
            PageRequest::Number(_) => num_pages,
        }
    }

    pub fn window(&self, number: u64) -> PageWindow {
        let per_page = u64::from(self.per_page.get());
        PageWindow {
            offset: number.saturating_sub(1).saturating_mul(per_page),
            limit: self.per_page.get(),
        }
    }

    pub fn page<T>(&self, number: u64, total_count: u64, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(total_count),
            total_count,
            per_page: self.per_page.get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn start_index(&self) -> u64 {
        if self.total_count == 0 {
            return 0;
        }
        (self.number - 1) * u64::from(self.per_page) + 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total_count,
            per_page: self.per_page,
        }
    }
}
