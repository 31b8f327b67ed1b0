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

//! # Evaluator Factory
//!
//! Turns a metric description (a request builder, a response schema and a
//! response handler) into a registered evaluator action. Every provider call
//! runs in a `{evaluator}#{method}` span, and its response is checked against
//! the metric's schema before the handler sees it.

use super::types::EvaluationEndpoint;
use crate::transport::EvaluationTransport;
use genkit_ai::evaluator::{
    define_evaluator, BaseEvalDataPoint, EvaluatorAction, EvaluatorInfo, Score,
};
use genkit_core::error::{Error, Result};
use genkit_core::schema::{parse_schema, ProvidedSchema};
use genkit_core::tracing::{in_new_span, SPAN_TYPE_ATTR};
use genkit_core::Registry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A factory for evaluator actions that share one endpoint and transport.
#[derive(Clone)]
pub struct EvaluatorFactory {
    endpoint: EvaluationEndpoint,
    transport: Arc<dyn EvaluationTransport>,
}

impl EvaluatorFactory {
    pub fn new(endpoint: EvaluationEndpoint, transport: Arc<dyn EvaluationTransport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &EvaluationEndpoint {
        &self.endpoint
    }

    /// Defines and registers the evaluator `name`.
    ///
    /// `to_request` builds the provider request for one datapoint, and
    /// `response_handler` maps a response that passed `response_schema` to
    /// a [`Score`].
    pub fn create<Resp, ToRequest, ResponseHandler>(
        &self,
        registry: &Registry,
        name: &str,
        info: EvaluatorInfo,
        response_schema: ProvidedSchema,
        to_request: ToRequest,
        response_handler: ResponseHandler,
    ) -> Result<EvaluatorAction>
    where
        Resp: DeserializeOwned + Send + 'static,
        ToRequest: Fn(&BaseEvalDataPoint) -> Value + Send + Sync + 'static,
        ResponseHandler: Fn(Resp) -> Score + Send + Sync + 'static,
    {
        let factory = self.clone();
        let to_request = Arc::new(to_request);
        let response_handler = Arc::new(response_handler);
        let span_name = format!("{}#{}", name, self.endpoint.method());

        define_evaluator(registry, name, info, move |datapoint: BaseEvalDataPoint| {
            let factory = factory.clone();
            let to_request = to_request.clone();
            let response_handler = response_handler.clone();
            let response_schema = response_schema.clone();
            let span_name = span_name.clone();
            async move {
                let request = to_request(&datapoint);
                let response: Resp = factory
                    .evaluate(&span_name, request, &response_schema)
                    .await?;
                Ok(response_handler(response))
            }
        })
    }

    /// Posts `request` to the endpoint and validates the reply.
    ///
    /// Transport failures become [`Error::EvaluationRequest`] and schema
    /// mismatches [`Error::ResponseParse`], both tagged with the endpoint url.
    pub async fn evaluate<Resp: DeserializeOwned>(
        &self,
        span_name: &str,
        request: Value,
        response_schema: &ProvidedSchema,
    ) -> Result<Resp> {
        let url = self.endpoint.url();
        in_new_span(span_name, |span| async move {
            span.set_attribute(SPAN_TYPE_ATTR, "util");
            span.set_input(&request);
            log::debug!("{} request: {}", span_name, request);

            let raw = self
                .transport
                .post_json(&url, &request)
                .await
                .map_err(|e| Error::EvaluationRequest {
                    url: url.clone(),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })?;
            span.set_output(&raw);

            parse_schema(raw, response_schema)
                .map_err(|source| Error::ResponseParse { url, source })
        })
        .await
    }
}
