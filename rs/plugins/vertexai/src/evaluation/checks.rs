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

//! # Checks Evaluators
//!
//! Content-safety metrics scored by the Checks `classifyContent` endpoint,
//! one evaluator per policy.

use super::evaluation::stringify;
use super::evaluator_factory::EvaluatorFactory;
use super::types::ChecksEvaluationMetric;
use genkit_ai::evaluator::{
    BaseEvalDataPoint, EvalStatusEnum, EvaluatorAction, EvaluatorInfo, Score,
};
use genkit_core::error::Result;
use genkit_core::schema::ProvidedSchema;
use genkit_core::Registry;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct PolicyResult {
    policy_type: String,
    score: f64,
    violation_result: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ClassifyContentResponse {
    #[schemars(length(min = 1))]
    policy_results: Vec<PolicyResult>,
}

impl PolicyResult {
    fn into_score(self) -> Score {
        let status = match self.violation_result.as_deref() {
            Some("VIOLATIVE") => EvalStatusEnum::Fail,
            Some("NON_VIOLATIVE") => EvalStatusEnum::Pass,
            _ => EvalStatusEnum::Unknown,
        };
        let verdict = self.violation_result.unwrap_or_else(|| "UNSPECIFIED".to_string());
        Score::new(self.score)
            .with_reasoning(format!("Status {}", verdict))
            .with_status(status)
    }
}

/// Registers one evaluator per policy as `checks/{policy}`.
pub fn checks_evaluators(
    registry: &Registry,
    factory: &EvaluatorFactory,
    metrics: &[ChecksEvaluationMetric],
) -> Result<Vec<EvaluatorAction>> {
    metrics
        .iter()
        .map(|metric| define_checks_evaluator(registry, factory, *metric))
        .collect()
}

fn define_checks_evaluator(
    registry: &Registry,
    factory: &EvaluatorFactory,
    metric: ChecksEvaluationMetric,
) -> Result<EvaluatorAction> {
    let policy_type = metric.metric_type().to_string();
    let threshold = metric.threshold();
    let name = format!("checks/{}", policy_type.to_lowercase());
    let info = EvaluatorInfo {
        display_name: policy_type.clone(),
        definition: format!("Checks the output against the {} policy", policy_type),
        is_billed: true,
    };

    let requested = policy_type.clone();
    factory.create(
        registry,
        &name,
        info,
        ProvidedSchema::of::<ClassifyContentResponse>(),
        move |datapoint: &BaseEvalDataPoint| {
            let content = datapoint.output.as_ref().map(stringify).unwrap_or_default();
            json!({
                "input": { "text_input": { "content": content } },
                "policies": [{ "policy_type": requested, "threshold": threshold }],
            })
        },
        move |response: ClassifyContentResponse| {
            let results = response.policy_results;
            let matching = results
                .iter()
                .position(|r| r.policy_type == policy_type)
                .unwrap_or(0);
            results
                .into_iter()
                .nth(matching)
                .map(PolicyResult::into_score)
                .unwrap_or_default()
        },
    )
}
