//! # roster-source
//!
//! Read side of the access-control system: the [`SourceApi`] seam, its
//! `ureq` implementation, lazy pagination and the shared retry policy.

pub mod api;
pub mod client;
pub mod error;
pub mod pagination;
pub mod retry;

pub use api::{Endpoint, Envelope, PageRequest, Pagination, RawPage, Resource, SourceApi};
pub use client::HttpSourceClient;
pub use error::SourceError;
pub use pagination::{fetch_all, Pages};
pub use retry::{Pause, RecordingPause, RetryPolicy, ThreadPause};
