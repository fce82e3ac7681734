//! Scripted transport and token sources for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use proxykit_common::SessionTokenSource;

use crate::error::{ClientError, Result};
use crate::transport::{ApiResponse, Transport};

/// One request observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_data(&self, data: Value) {
        self.push(Ok(ApiResponse::success(Some(data))));
    }

    pub fn push_success(&self) {
        self.push(Ok(ApiResponse::success(None)));
    }

    pub fn push_failure(&self, message: &str) {
        self.push(Ok(ApiResponse::failure(message)));
    }

    pub fn push_err(&self, error: ClientError) {
        self.push(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, response: Result<ApiResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn respond(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::InvalidResponse(format!("unscripted {method} {path}"))))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.respond("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.respond("POST", path, Some(body))
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.respond("PATCH", path, Some(body))
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.respond("DELETE", path, None)
    }
}

/// Token source yielding `tokens` in order, then `EXHAUSTD`.
pub fn sequence(tokens: &[&str]) -> Arc<dyn SessionTokenSource> {
    let queue: Mutex<VecDeque<String>> =
        Mutex::new(tokens.iter().map(ToString::to_string).collect());
    Arc::new(move || {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "EXHAUSTD".to_string())
    })
}
