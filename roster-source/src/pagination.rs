//! Lazy page-by-page iteration over a list endpoint.
//!
//! ## Termination
//!
//! A [`Pages`] sequence ends at the first of:
//! 1. a page with zero records;
//! 2. the cumulative record count reaching the `total` reported by the first
//!    page (ignored when absent, or zero alongside a non-empty page);
//! 3. a non-success envelope (logged at warn, not an error);
//! 4. an `Err` from the API (yielded once, then the sequence is fused).

use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::api::{Endpoint, PageRequest, SourceApi, FIRST_PAGE};
use crate::error::SourceError;
use crate::retry::{Pause, RetryPolicy};

/// Iterator over the decoded records of a paginated endpoint.
pub struct Pages<'a, T> {
    api: &'a dyn SourceApi,
    endpoint: Endpoint,
    page_size: u32,
    retry: RetryPolicy,
    pause: &'a dyn Pause,
    next_page: u32,
    total: Option<u64>,
    received: u64,
    buffer: VecDeque<T>,
    requests: u32,
    yielded: u64,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Pages<'a, T> {
    pub fn new(
        api: &'a dyn SourceApi,
        endpoint: Endpoint,
        page_size: u32,
        retry: RetryPolicy,
        pause: &'a dyn Pause,
    ) -> Self {
        Self {
            api,
            endpoint,
            page_size: page_size.max(1),
            retry,
            pause,
            next_page: FIRST_PAGE,
            total: None,
            received: 0,
            buffer: VecDeque::new(),
            requests: 0,
            yielded: 0,
            done: false,
            _record: PhantomData,
        }
    }

    /// Page requests issued so far, retries included.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Records handed out so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    fn fetch_next_page(&mut self) -> Result<(), SourceError> {
        let request = PageRequest {
            page_num: self.next_page,
            page_size: self.page_size,
        };
        let api = self.api;
        let endpoint = &self.endpoint;
        let mut calls = 0;
        let result = self.retry.run(self.pause, SourceError::is_rate_limited, |_| {
            calls += 1;
            api.get_page(endpoint, request)
        });
        self.requests += calls;
        let page = result?;

        if !page.is_success() {
            tracing::warn!(
                "{} page {} returned {}: {}; stopping pagination early",
                self.endpoint.resource.path(),
                request.page_num,
                page.code,
                page.msg
            );
            self.done = true;
            return Ok(());
        }

        let records = page.data.unwrap_or_default();
        if request.page_num == FIRST_PAGE {
            self.total = page
                .pagination
                .and_then(|p| p.total)
                .filter(|total| *total > 0 || records.is_empty());
        }
        if records.is_empty() {
            self.done = true;
            return Ok(());
        }

        tracing::debug!(
            "{} page {}: {} records",
            self.endpoint.resource.path(),
            request.page_num,
            records.len()
        );
        self.received += records.len() as u64;
        for raw in records {
            match serde_json::from_value::<T>(raw) {
                Ok(record) => self.buffer.push_back(record),
                Err(err) => tracing::warn!(
                    "skipping undecodable {} record: {err}",
                    self.endpoint.resource.path()
                ),
            }
        }

        if let Some(total) = self.total {
            if self.received >= total {
                self.done = true;
            }
        }
        self.next_page += 1;
        Ok(())
    }
}

impl<T: DeserializeOwned> Iterator for Pages<'_, T> {
    type Item = Result<T, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

impl<T: DeserializeOwned> std::iter::FusedIterator for Pages<'_, T> {}

/// Drain a [`Pages`] sequence into a `Vec`, failing on the first error.
pub fn fetch_all<T: DeserializeOwned>(
    api: &dyn SourceApi,
    endpoint: Endpoint,
    page_size: u32,
    retry: RetryPolicy,
    pause: &dyn Pause,
) -> Result<Vec<T>, SourceError> {
    Pages::new(api, endpoint, page_size, retry, pause).collect()
}
