use std::collections::VecDeque;

use serde_json::Value;
use tracing::trace;

use crate::{
    api::{Filters, Pagination, ResourceApi},
    error::Result,
};

/// Draining iterator over every record of a filtered list.
///
/// Pages are requested lazily, ordered by creation time so that records do
/// not shift between pages while the scan runs. The scan stops once `count`
/// records have been covered or the backend returns an empty page.
pub struct Pages<'s> {
    api: ResourceApi<'s>,
    filters: Filters,
    pagination: Pagination,
    buffer: VecDeque<Value>,
    done: bool,
}

impl<'s> Pages<'s> {
    pub fn new(api: ResourceApi<'s>, mut filters: Filters, page_size: u32) -> Self {
        filters
            .entry("ordering".to_string())
            .or_insert_with(|| "pulp_created".to_string());
        Self {
            api,
            filters,
            pagination: Pagination::first(page_size.max(1)),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let page = self.api.list(self.pagination, &self.filters)?;
        trace!(
            path = self.api.endpoint().list_path(),
            offset = page.offset,
            count = page.count,
            "fetched page"
        );

        self.pagination = self.pagination.after(page.results.len());
        if page.results.is_empty() || u64::from(self.pagination.offset) >= page.count {
            self.done = true;
        }
        self.buffer.extend(page.results);
        Ok(())
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fetch() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
