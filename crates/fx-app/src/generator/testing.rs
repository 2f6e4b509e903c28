use crate::generator::backend::{GenerationRelay, RelayError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) const API_BASE: &str = "https://api.replicate.com/v1";

pub(crate) fn prediction(id: &str) -> Value {
    json!({
        "id": id,
        "status": "starting",
        "urls": {
            "get": format!("{API_BASE}/predictions/{id}"),
            "cancel": format!("{API_BASE}/predictions/{id}/cancel"),
        }
    })
}

pub(crate) fn status(status: &str) -> Value {
    json!({ "status": status })
}

pub(crate) fn succeeded(output: &str) -> Value {
    json!({ "status": "succeeded", "output": [output] })
}

/// In-memory relay that replays queued responses and records every call.
///
/// Empty queues fall back to a fresh prediction, `processing`, and an
/// acknowledged cancel respectively.
#[derive(Default)]
pub(crate) struct ScriptedRelay {
    creates: Mutex<VecDeque<Result<Value, RelayError>>>,
    statuses: Mutex<VecDeque<Result<Value, RelayError>>>,
    cancels: Mutex<VecDeque<Result<Value, RelayError>>>,
    create_gate: Option<std::sync::Arc<Notify>>,
    status_delay: Duration,
    status_panics: bool,
    pub created: Mutex<Vec<Value>>,
    pub polled: Mutex<Vec<String>>,
    pub canceled: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedRelay {
    pub fn with_create(self, result: Result<Value, RelayError>) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    pub fn with_status(self, result: Result<Value, RelayError>) -> Self {
        self.statuses.lock().unwrap().push_back(result);
        self
    }

    pub fn with_cancel(self, result: Result<Value, RelayError>) -> Self {
        self.cancels.lock().unwrap().push_back(result);
        self
    }

    /// Creation calls block until the gate is notified.
    pub fn gated(mut self, gate: std::sync::Arc<Notify>) -> Self {
        self.create_gate = Some(gate);
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    /// Status calls panic, taking the poll task down with them.
    pub fn panicking_status(mut self) -> Self {
        self.status_panics = true;
        self
    }

    pub fn poll_count(&self) -> usize {
        self.polled.lock().unwrap().len()
    }

    pub fn cancel_urls(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationRelay for ScriptedRelay {
    async fn create(
        &self,
        _api_key: &str,
        _model_endpoint: &str,
        body: Value,
    ) -> Result<Value, RelayError> {
        let n = {
            let mut created = self.created.lock().unwrap();
            created.push(body);
            created.len()
        };
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        let next = self.creates.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(prediction(&format!("job-{n}"))))
    }

    async fn status(&self, _api_key: &str, status_url: &str) -> Result<Value, RelayError> {
        self.polled.lock().unwrap().push(status_url.to_string());
        if self.status_panics {
            panic!("status call for {status_url} blew up");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(status("processing")))
    }

    async fn cancel(&self, _api_key: &str, cancel_url: &str) -> Result<Value, RelayError> {
        self.canceled.lock().unwrap().push(cancel_url.to_string());
        let next = self.cancels.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(status("canceled")))
    }
}
