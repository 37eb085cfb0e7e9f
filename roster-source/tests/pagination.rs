//! Pagination termination and failure behaviour against a scripted API.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use roster_core::{SourcePolicy, SourceUserProfile, UserId};
use roster_source::{
    Endpoint, Envelope, PageRequest, Pages, Pagination, RawPage, RecordingPause, RetryPolicy,
    SourceApi, SourceError,
};
use rstest::rstest;
use serde_json::{json, Value};

#[derive(Default)]
struct ScriptedApi {
    pages: RefCell<VecDeque<Result<RawPage, SourceError>>>,
    seen: RefCell<Vec<PageRequest>>,
}

impl ScriptedApi {
    fn new(pages: Vec<Result<RawPage, SourceError>>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.seen.borrow().clone()
    }
}

impl SourceApi for ScriptedApi {
    fn get_page(&self, _endpoint: &Endpoint, request: PageRequest) -> Result<RawPage, SourceError> {
        self.seen.borrow_mut().push(request);
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Envelope::success(vec![], None)))
    }

    fn get_user(&self, id: &UserId) -> Result<SourceUserProfile, SourceError> {
        Err(SourceError::NotFound {
            what: id.to_string(),
        })
    }
}

fn records(start: usize, n: usize) -> Vec<Value> {
    (start..start + n)
        .map(|i| json!({ "id": format!("p{i}"), "name": format!("policy {i}") }))
        .collect()
}

fn page(start: usize, n: usize, total: Option<u64>) -> Result<RawPage, SourceError> {
    let pagination = total.map(|total| Pagination {
        total: Some(total),
        ..Pagination::default()
    });
    Ok(Envelope::success(records(start, n), pagination))
}

fn pages<'a>(api: &'a ScriptedApi, pause: &'a RecordingPause) -> Pages<'a, SourcePolicy> {
    Pages::new(
        api,
        Endpoint::policies(),
        100,
        RetryPolicy::new(3, Duration::from_secs(1)),
        pause,
    )
}

#[test]
fn empty_page_terminates_after_237_records_and_4_requests() {
    let api = ScriptedApi::new(vec![
        page(0, 100, None),
        page(100, 100, None),
        page(200, 37, None),
        page(237, 0, None),
    ]);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);
    let all: Vec<SourcePolicy> = iter.by_ref().collect::<Result<_, _>>().expect("pages");

    assert_eq!(all.len(), 237);
    assert_eq!(iter.requests(), 4);
    assert_eq!(iter.yielded(), 237);
    let nums: Vec<u32> = api.requests().iter().map(|r| r.page_num).collect();
    assert_eq!(nums, vec![1, 2, 3, 4]);
    assert!(api.requests().iter().all(|r| r.page_size == 100));
}

#[test]
fn reported_total_stops_before_empty_page() {
    let api = ScriptedApi::new(vec![page(0, 100, Some(150)), page(100, 50, None)]);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);
    let all: Vec<SourcePolicy> = iter.by_ref().collect::<Result<_, _>>().expect("pages");

    assert_eq!(all.len(), 150);
    assert_eq!(iter.requests(), 2);
}

#[test]
fn zero_total_with_records_falls_back_to_empty_page() {
    let api = ScriptedApi::new(vec![page(0, 3, Some(0)), page(3, 0, None)]);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);
    let all: Vec<SourcePolicy> = iter.by_ref().collect::<Result<_, _>>().expect("pages");

    assert_eq!(all.len(), 3);
    assert_eq!(iter.requests(), 2);
}

#[test]
fn application_failure_stops_early_without_error() {
    let _ = env_logger::builder().is_test(true).try_init();
    let api = ScriptedApi::new(vec![
        page(0, 100, None),
        Ok(Envelope::failure("CODE_SYSTEM_ERROR", "try later")),
        page(100, 100, None),
    ]);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);
    let all: Vec<SourcePolicy> = iter.by_ref().collect::<Result<_, _>>().expect("pages");

    assert_eq!(all.len(), 100);
    assert_eq!(iter.requests(), 2);
}

#[test]
fn transport_failure_is_yielded_once_then_fused() {
    let api = ScriptedApi::new(vec![
        page(0, 2, None),
        Err(SourceError::Transport {
            url: "https://h/access_policies".into(),
            message: "connection reset".into(),
        }),
    ]);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);

    assert!(matches!(iter.next(), Some(Ok(_))));
    assert!(matches!(iter.next(), Some(Ok(_))));
    assert!(matches!(iter.next(), Some(Err(SourceError::Transport { .. }))));
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
    assert_eq!(iter.requests(), 2);
}

#[rstest]
#[case(1, 2)]
#[case(2, 3)]
fn rate_limited_page_is_retried_with_backoff(#[case] limited: usize, #[case] expected_requests: u32) {
    let mut script: Vec<Result<RawPage, SourceError>> = (0..limited)
        .map(|_| {
            Err(SourceError::RateLimited {
                url: "https://h/access_policies".into(),
            })
        })
        .collect();
    script.push(page(0, 5, Some(5)));
    let api = ScriptedApi::new(script);
    let pause = RecordingPause::new();
    let mut iter = pages(&api, &pause);
    let all: Vec<SourcePolicy> = iter.by_ref().collect::<Result<_, _>>().expect("pages");

    assert_eq!(all.len(), 5);
    assert_eq!(iter.requests(), expected_requests);
    assert_eq!(pause.calls().len(), limited);
}

#[test]
fn undecodable_record_is_skipped() {
    let mut data = records(0, 2);
    data.push(json!({ "name": "no id" }));
    let api = ScriptedApi::new(vec![Ok(Envelope::success(data, None))]);
    let pause = RecordingPause::new();
    let all: Vec<SourcePolicy> = pages(&api, &pause)
        .collect::<Result<_, _>>()
        .expect("pages");
    assert_eq!(all.len(), 2);
}
