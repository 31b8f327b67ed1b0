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

//! # Vertex AI Evaluators
//!
//! Request builders and response shapes for the metrics served by the Vertex
//! AI `evaluateInstances` endpoint.

use super::evaluator_factory::EvaluatorFactory;
use super::types::{VertexAIEvaluationMetric, VertexAIEvaluationMetricType};
use genkit_ai::evaluator::{BaseEvalDataPoint, EvaluatorAction, EvaluatorInfo, Score};
use genkit_core::error::Result;
use genkit_core::schema::ProvidedSchema;
use genkit_core::Registry;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Renders a datapoint field as plain text.
pub(crate) fn stringify(input: &Value) -> String {
    match input.as_str() {
        Some(s) => s.to_string(),
        None => input.to_string(),
    }
}

fn prediction(datapoint: &BaseEvalDataPoint) -> String {
    datapoint.output.as_ref().map(stringify).unwrap_or_default()
}

fn joined_context(datapoint: &BaseEvalDataPoint) -> Option<String> {
    datapoint
        .context
        .as_ref()
        .map(|c| c.iter().map(stringify).collect::<Vec<_>>().join(". "))
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MetricValue {
    score: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct BleuResults {
    #[schemars(length(min = 1))]
    bleu_metric_values: Vec<MetricValue>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct BleuResponse {
    bleu_results: BleuResults,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RougeResults {
    #[schemars(length(min = 1))]
    rouge_metric_values: Vec<MetricValue>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RougeResponse {
    rouge_results: RougeResults,
}

/// The result shape shared by the pointwise (model-graded) metrics.
#[derive(Debug, Deserialize)]
struct PointwiseResult {
    score: f64,
    #[serde(default)]
    explanation: String,
    confidence: Option<f64>,
}

impl From<PointwiseResult> for Score {
    fn from(result: PointwiseResult) -> Self {
        let mut score = Score::new(result.score);
        score.details = Some(json!({
            "reasoning": result.explanation,
            "confidence": result.confidence,
        }));
        score
    }
}

/// `fluency`, `summarizationQuality` and so on, or `None` for the
/// reference-based metrics.
fn pointwise_key(metric: VertexAIEvaluationMetricType) -> Option<&'static str> {
    use VertexAIEvaluationMetricType::*;
    match metric {
        Bleu | Rouge => None,
        Fluency => Some("fluency"),
        Safety => Some("safety"),
        Groundedness => Some("groundedness"),
        SummarizationQuality => Some("summarizationQuality"),
        SummarizationHelpfulness => Some("summarizationHelpfulness"),
        SummarizationVerbosity => Some("summarizationVerbosity"),
    }
}

fn pointwise_schema(result_key: &str) -> ProvidedSchema {
    json!({
        "type": "object",
        "required": [result_key],
        "properties": {
            result_key: {
                "type": "object",
                "required": ["score"],
                "properties": {
                    "score": { "type": "number" },
                    "explanation": { "type": "string" },
                    "confidence": { "type": "number" },
                },
            },
        },
    })
    .into()
}

fn info(metric: VertexAIEvaluationMetricType) -> EvaluatorInfo {
    use VertexAIEvaluationMetricType::*;
    let (display_name, definition) = match metric {
        Bleu => (
            "BLEU",
            "Computes the BLEU score by comparing the output against the ground truth",
        ),
        Rouge => (
            "ROUGE",
            "Computes the ROUGE score by comparing the output against the ground truth",
        ),
        Fluency => ("Fluency", "Assesses the language mastery of an output"),
        Safety => ("Safety", "Assesses the level of safety of an output"),
        Groundedness => (
            "Groundedness",
            "Assesses the ability to provide or reference information included only in the context",
        ),
        SummarizationQuality => (
            "Summarization Quality",
            "Assesses the overall ability to summarize text",
        ),
        SummarizationHelpfulness => (
            "Summarization Helpfulness",
            "Assesses the ability to provide a summarization, which contains the details necessary to substitute the original text",
        ),
        SummarizationVerbosity => (
            "Summarization Verbosity",
            "Assesses the ability to provide a succinct summarization",
        ),
    };
    EvaluatorInfo {
        display_name: display_name.to_string(),
        definition: definition.to_string(),
        is_billed: true,
    }
}

/// Registers one evaluator per metric as `vertexai/{metric}`.
pub fn vertex_evaluators(
    registry: &Registry,
    factory: &EvaluatorFactory,
    metrics: &[VertexAIEvaluationMetric],
) -> Result<Vec<EvaluatorAction>> {
    metrics
        .iter()
        .map(|metric| define_vertex_evaluator(registry, factory, metric))
        .collect()
}

fn define_vertex_evaluator(
    registry: &Registry,
    factory: &EvaluatorFactory,
    metric: &VertexAIEvaluationMetric,
) -> Result<EvaluatorAction> {
    let metric_type = metric.metric_type();
    let metric_spec = metric.metric_spec();
    let name = format!("vertexai/{}", metric_type.to_string().to_lowercase());
    let info = info(metric_type);

    match metric_type {
        VertexAIEvaluationMetricType::Bleu => factory.create(
            registry,
            &name,
            info,
            ProvidedSchema::of::<BleuResponse>(),
            move |datapoint: &BaseEvalDataPoint| {
                json!({
                    "bleuInput": {
                        "metricSpec": metric_spec,
                        "instances": [reference_instance(datapoint)],
                    }
                })
            },
            |response: BleuResponse| {
                first_score(response.bleu_results.bleu_metric_values)
            },
        ),
        VertexAIEvaluationMetricType::Rouge => factory.create(
            registry,
            &name,
            info,
            ProvidedSchema::of::<RougeResponse>(),
            move |datapoint: &BaseEvalDataPoint| {
                json!({
                    "rougeInput": {
                        "metricSpec": metric_spec,
                        "instances": [reference_instance(datapoint)],
                    }
                })
            },
            |response: RougeResponse| {
                first_score(response.rouge_results.rouge_metric_values)
            },
        ),
        pointwise => {
            let key = pointwise_key(pointwise).unwrap_or_default();
            let input_key = format!("{}Input", key);
            let result_key = format!("{}Result", key);
            let with_context = pointwise != VertexAIEvaluationMetricType::Fluency
                && pointwise != VertexAIEvaluationMetricType::Safety;
            let with_instruction = key.starts_with("summarization");

            factory.create(
                registry,
                &name,
                info,
                pointwise_schema(&result_key),
                move |datapoint: &BaseEvalDataPoint| {
                    let context = joined_context(datapoint).filter(|_| with_context);
                    let instruction = with_instruction.then(|| stringify(&datapoint.input));
                    let instance = json!({
                        "prediction": prediction(datapoint),
                        "context": context,
                        "instruction": instruction,
                    });
                    json!({
                        input_key.as_str(): {
                            "metricSpec": metric_spec,
                            "instance": instance,
                        }
                    })
                },
                move |mut response: Map<String, Value>| {
                    response
                        .remove(&result_key)
                        .and_then(|result| serde_json::from_value::<PointwiseResult>(result).ok())
                        .map(Score::from)
                        .unwrap_or_default()
                },
            )
        }
    }
}

fn reference_instance(datapoint: &BaseEvalDataPoint) -> Value {
    json!({
        "prediction": prediction(datapoint),
        "reference": datapoint.reference.as_ref().map(stringify).unwrap_or_default(),
    })
}

fn first_score(values: Vec<MetricValue>) -> Score {
    values
        .first()
        .map(|v| Score::new(v.score))
        .unwrap_or_default()
}
