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

//! # Evaluation Plugins
//!
//! Entry points that register the configured evaluators against the real
//! endpoints over [`HttpTransport`].

use super::checks::checks_evaluators;
use super::evaluation::vertex_evaluators;
use super::evaluator_factory::EvaluatorFactory;
use super::types::{ChecksPluginOptions, EvaluationEndpoint, EvaluationPluginOptions};
use crate::common::get_derived_params;
use crate::transport::HttpTransport;
use genkit_ai::evaluator::EvaluatorAction;
use genkit_core::{Registry, Result};
use std::env;
use std::sync::Arc;

/// Registers the Vertex AI `evaluateInstances` metrics listed in `options`.
pub fn vertex_ai_evaluation(
    registry: &Registry,
    options: &EvaluationPluginOptions,
) -> Result<Vec<EvaluatorAction>> {
    let params = get_derived_params(&options.common)?;
    log::info!(
        "Registering {} Vertex AI evaluator(s) for {}/{}",
        options.evaluation.metrics.len(),
        params.project_id,
        params.location
    );
    let transport = Arc::new(HttpTransport::new(params.access_token.clone()));
    let factory = EvaluatorFactory::new(EvaluationEndpoint::from(&params), transport);
    vertex_evaluators(registry, &factory, &options.evaluation.metrics)
}

/// Registers the Checks `classifyContent` policies listed in `options`.
///
/// The token falls back to `GOOGLE_ACCESS_TOKEN`.
pub fn checks_evaluation(
    registry: &Registry,
    options: &ChecksPluginOptions,
) -> Result<Vec<EvaluatorAction>> {
    let access_token = options
        .access_token
        .clone()
        .or_else(|| env::var("GOOGLE_ACCESS_TOKEN").ok());
    log::info!("Registering {} Checks evaluator(s)", options.metrics.len());
    let transport = Arc::new(HttpTransport::new(access_token));
    let factory = EvaluatorFactory::new(EvaluationEndpoint::ClassifyContent, transport);
    checks_evaluators(registry, &factory, &options.metrics)
}
