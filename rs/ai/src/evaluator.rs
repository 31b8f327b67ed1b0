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

//! # Evaluators
//!
//! An evaluator scores every datapoint of a dataset. Each datapoint is scored
//! in its own `Test Case {id}` span, concurrently with the others, and its
//! response carries the trace and span ids of that span.

use async_trait::async_trait;
use futures::future::try_join_all;
use genkit_core::action::{
    Action, ActionBuilder, ActionFnArg, ActionMetadata, ActionRunOptions, ErasedAction,
};
use genkit_core::error::Result;
use genkit_core::registry::{ActionType, Registry};
use genkit_core::tracing::{in_new_span, SPAN_TYPE_ATTR};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Represents a single data point for an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseDataPoint {
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
}

/// A data point guaranteed to have a `testCaseId`, used within evaluator actions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvalDataPoint {
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Value>,
    pub test_case_id: String,
}

impl From<BaseDataPoint> for BaseEvalDataPoint {
    fn from(datapoint: BaseDataPoint) -> Self {
        Self {
            test_case_id: datapoint
                .test_case_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            input: datapoint.input,
            output: datapoint.output,
            context: datapoint.context,
            reference: datapoint.reference,
        }
    }
}

pub type Dataset = Vec<BaseDataPoint>;

/// The pass/fail status of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvalStatusEnum {
    Unknown,
    Pass,
    Fail,
}

/// The result of a single evaluation metric.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Numeric, boolean or categorical score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EvalStatusEnum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form details, usually `{"reasoning": "..."}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Score {
    pub fn new(score: impl Into<Value>) -> Self {
        Self {
            score: Some(score.into()),
            ..Default::default()
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.details = Some(json!({ "reasoning": reasoning.into() }));
        self
    }

    pub fn with_status(mut self, status: EvalStatusEnum) -> Self {
        self.status = Some(status);
        self
    }
}

/// The evaluation response for a single test case.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvalResponse {
    pub test_case_id: String,
    pub evaluation: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

pub type EvalResponses = Vec<EvalResponse>;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvalRequest {
    pub dataset: Dataset,
    pub eval_run_id: String,
}

/// Descriptive information about an evaluator.
#[derive(Debug, Serialize, Deserialize, JsonSchema, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorInfo {
    pub display_name: String,
    pub definition: String,
    /// Whether running the evaluator is billed by its provider.
    pub is_billed: bool,
}

#[derive(Clone, Debug)]
pub struct EvaluatorAction(pub Action<EvalRequest, EvalResponses, ()>);

impl Deref for EvaluatorAction {
    type Target = Action<EvalRequest, EvalResponses, ()>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl ErasedAction for EvaluatorAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.0.meta
    }

    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value> {
        self.0.run_json(input, options).await
    }
}

async fn score_datapoint<F, Fut>(runner: &F, datapoint: BaseEvalDataPoint) -> Result<EvalResponse>
where
    F: Fn(BaseEvalDataPoint) -> Fut,
    Fut: Future<Output = Result<Score>>,
{
    let test_case_id = datapoint.test_case_id.clone();
    in_new_span(format!("Test Case {}", test_case_id), |span| async move {
        span.set_attribute(SPAN_TYPE_ATTR, "evaluator");
        span.set_input(&datapoint);
        let evaluation = runner(datapoint).await?;
        span.set_output(&evaluation);
        let trace = span.trace_context();
        Ok(EvalResponse {
            test_case_id,
            evaluation,
            trace_id: Some(trace.trace_id.clone()),
            span_id: Some(trace.span_id.clone()),
        })
    })
    .await
}

/// Defines an evaluator and registers it as `/evaluator/{name}`.
///
/// `runner` scores one datapoint. Datapoints are scored concurrently and the
/// responses keep dataset order; the first failure fails the whole run.
pub fn define_evaluator<F, Fut>(
    registry: &Registry,
    name: &str,
    info: EvaluatorInfo,
    runner: F,
) -> Result<EvaluatorAction>
where
    F: Fn(BaseEvalDataPoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Score>> + Send + 'static,
{
    let runner = Arc::new(runner);
    let handler = move |request: EvalRequest, _args: ActionFnArg<()>| {
        let runner = runner.clone();
        async move {
            log::debug!(
                "Evaluating {} datapoints (run {})",
                request.dataset.len(),
                request.eval_run_id
            );
            let scored = request
                .dataset
                .into_iter()
                .map(|datapoint| score_datapoint(runner.as_ref(), datapoint.into()));
            try_join_all(scored).await
        }
    };

    let mut metadata = HashMap::new();
    metadata.insert("evaluator".to_string(), json!(info));
    let action = ActionBuilder::new(ActionType::Evaluator, name, handler)
        .with_description(info.definition.clone())
        .with_metadata(metadata)
        .build();
    let evaluator = EvaluatorAction(action);
    registry.register_action(Arc::new(evaluator.clone()))?;
    Ok(evaluator)
}

/// Runs the evaluator registered as `name` over `dataset`.
///
/// A fresh run id is generated when `eval_run_id` is `None`.
pub async fn evaluate(
    registry: &Registry,
    name: &str,
    dataset: Dataset,
    eval_run_id: Option<String>,
) -> Result<EvalResponses> {
    let request = EvalRequest {
        dataset,
        eval_run_id: eval_run_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    };
    let response = registry
        .invoke(&ActionType::Evaluator.key(name), serde_json::to_value(request)?)
        .await?;
    Ok(serde_json::from_value(response)?)
}
