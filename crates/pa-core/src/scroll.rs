//! Composite aggregation scroller.
//!
//! A finite, non-restartable iterator of pages. Each `next()` is one blocking
//! store round-trip. The sequence ends after a page without buckets, after a
//! page without an `after_key`, once the caller's page limit is reached, or
//! right after yielding an error.

use pa_common::{Aggregation, AggregationRequest, CompositeBucket, CompositePage, StoreError};

use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::store::InstanceStore;

pub struct CompositePages<'a> {
    store: &'a dyn InstanceStore,
    request: AggregationRequest,
    max_pages: Option<usize>,
    fetched: usize,
    done: bool,
    log: LogContext,
}

impl<'a> CompositePages<'a> {
    /// `request` must carry a composite aggregation; anything else yields a
    /// single `StoreError::Query`.
    pub fn new(
        store: &'a dyn InstanceStore,
        request: AggregationRequest,
        max_pages: Option<usize>,
        log: LogContext,
    ) -> Self {
        Self {
            store,
            request,
            max_pages,
            fetched: 0,
            done: false,
            log,
        }
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// Drain every remaining page into one bucket list.
    pub fn collect_buckets(self) -> Result<Vec<CompositeBucket>, StoreError> {
        let mut buckets = Vec::new();
        for page in self {
            buckets.extend(page?.buckets);
        }
        Ok(buckets)
    }

    fn fetch(&mut self) -> Result<CompositePage, StoreError> {
        let page = self.store.aggregate(&self.request)?.into_page()?;
        self.fetched += 1;
        log_event!(
            self.log,
            DEBUG,
            event_names::SCROLL_PAGE,
            Stage::Scroll,
            "composite page",
            page = self.fetched,
            buckets = page.buckets.len(),
            hits = page.hits
        );
        Ok(page)
    }
}

impl Iterator for CompositePages<'_> {
    type Item = Result<CompositePage, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.max_pages.is_some_and(|max| self.fetched >= max) {
            self.done = true;
            return None;
        }
        if !matches!(self.request.aggregation, Aggregation::Composite(_)) {
            self.done = true;
            return Some(Err(StoreError::Query(
                "scroll requires a composite aggregation".to_string(),
            )));
        }

        let page = match self.fetch() {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if page.buckets.is_empty() {
            self.done = true;
            return None;
        }

        match (&page.after_key, &mut self.request.aggregation) {
            (Some(key), Aggregation::Composite(composite)) => composite.after = Some(key.clone()),
            _ => self.done = true,
        }
        Some(Ok(page))
    }
}
