//! Test doubles for exercising the pipeline without a network.

use crate::config::FetchVariant;
use crate::error::FetchError;
use crate::fetch::{Fetch, FetchResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted [`Fetch`] implementation.
///
/// Responses are registered per URL and consumed in order, with the last
/// one repeating; unregistered URLs return a 404. Calls and peak
/// in-flight concurrency are recorded for assertions.
#[derive(Default)]
pub(crate) struct StubFetcher {
    responses: Mutex<HashMap<String, Vec<Result<FetchResponse, FetchError>>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `url` with a 200 and the given body.
    pub fn ok(self, url: &str, body: &str) -> Self {
        self.respond(
            url,
            Ok(FetchResponse {
                status: 200,
                body: body.to_string(),
            }),
        )
    }

    /// Respond to `url` with a non-success status.
    pub fn fail(self, url: &str, status: u16) -> Self {
        self.respond(
            url,
            Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        )
    }

    /// Queue one scripted response for `url`.
    pub fn respond(self, url: &str, response: Result<FetchResponse, FetchError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(response);
        self
    }

    /// Every URL fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Peak number of concurrently in-flight fetches.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn get(
        &self,
        url: &str,
        _variant: &FetchVariant,
        _timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // Yield long enough for sibling workers to overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
