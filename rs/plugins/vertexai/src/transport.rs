// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Evaluation Transport
//!
//! The seam between evaluators and the network. Evaluators only need "post
//! this JSON body, get a JSON body back"; [`HttpTransport`] does that over
//! `reqwest`, and tests substitute their own implementation.

use async_trait::async_trait;
use genkit_core::utils::strip_null_values;
use serde_json::Value;
use thiserror::Error;

/// A failure of the underlying HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait EvaluationTransport: Send + Sync {
    /// Posts `body` and returns the decoded 2xx response. A body that is not
    /// JSON comes back as a JSON string, leaving the caller's response schema
    /// to reject it.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

/// A `reqwest` transport that optionally authenticates with a bearer token.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
    access_token: Option<String>,
}

impl HttpTransport {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EvaluationTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let mut request = self
            .client
            .post(url)
            .json(&strip_null_values(body.clone()));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Evaluation request to {} failed with {}", url, status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(decode_body(response.text().await?))
    }
}

fn decode_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or_else(|e| {
        log::debug!("Response body is not JSON ({}); passing it on as text", e);
        Value::String(text)
    })
}
