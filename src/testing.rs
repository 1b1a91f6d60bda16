//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiClient, ApiError, ApiRequest};

/// Records every request and answers from a queue of canned results, falling
/// back to a fixed result once the queue is empty.
pub struct StubClient {
    requests: Mutex<Vec<ApiRequest>>,
    queued: Mutex<VecDeque<Result<Value, ApiError>>>,
    fallback: Result<Value, ApiError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubClient {
    pub fn new() -> Self {
        Self::returning(json!({ "ok": true }))
    }

    pub fn returning(value: Value) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            fallback: Ok(value),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::new()
        }
    }

    pub fn then(self, result: Result<Value, ApiError>) -> Self {
        self.queued.lock().unwrap().push_back(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl ApiClient for StubClient {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}
