use serde::Serialize;

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationSummary {
    pub page_index: usize,
    pub total_pages: usize,
    pub first_record_ordinal: usize,
    pub last_record_ordinal: usize,
    pub total_records: usize,
}

/// A fetched batch served one page at a time.
#[derive(Debug, Clone)]
pub struct PageWindow<T> {
    items: Vec<T>,
    page_size: usize,
    page_index: usize,
}

impl<T> PageWindow<T> {
    pub fn new(page_size: usize) -> Result<Self, DashboardError> {
        check_page_size(page_size)?;
        Ok(Self {
            items: Vec::new(),
            page_size,
            page_index: 1,
        })
    }

    pub fn load(&mut self, items: Vec<T>) {
        self.items = items;
        self.page_index = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), DashboardError> {
        check_page_size(page_size)?;
        self.page_size = page_size;
        self.page_index = 1;
        Ok(())
    }

    pub fn go_to_page(&mut self, page: usize) -> &[T] {
        self.page_index = page.clamp(1, self.total_pages());
        self.current_slice()
    }

    pub fn current_slice(&self) -> &[T] {
        let start = ((self.page_index - 1) * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    pub fn summary(&self) -> PaginationSummary {
        let total_records = self.items.len();
        PaginationSummary {
            page_index: self.page_index,
            total_pages: self.total_pages(),
            first_record_ordinal: ((self.page_index - 1) * self.page_size + 1).min(total_records),
            last_record_ordinal: (self.page_index * self.page_size).min(total_records),
            total_records,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size).max(1)
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages()
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

fn check_page_size(page_size: usize) -> Result<(), DashboardError> {
    if page_size == 0 {
        return Err(DashboardError::Config("page size must be positive".into()));
    }
    Ok(())
}
