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

//! # Types for Vertex AI Evaluation
//!
//! Metric catalogues and options for the two evaluation endpoints: Vertex AI
//! `evaluateInstances` and the Checks `classifyContent` classifier.

use crate::common::{DerivedParams, VertexAIPluginOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

/// The type of metric to be used for evaluation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VertexAIEvaluationMetricType {
    Bleu,
    Rouge,
    Fluency,
    Safety,
    Groundedness,
    SummarizationQuality,
    SummarizationHelpfulness,
    SummarizationVerbosity,
}

/// Detailed configuration for an evaluation metric.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VertexAIEvaluationMetricConfig {
    #[serde(rename = "type")]
    pub metric_type: VertexAIEvaluationMetricType,
    /// Sent verbatim as the `metricSpec` of the request. See
    /// https://cloud.google.com/vertex-ai/generative-ai/docs/model-reference/evaluation#parameter-list
    #[serde(default)]
    pub metric_spec: Value,
}

/// A metric given either by type alone or with a detailed configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum VertexAIEvaluationMetric {
    Type(VertexAIEvaluationMetricType),
    Config(VertexAIEvaluationMetricConfig),
}

impl VertexAIEvaluationMetric {
    pub fn metric_type(&self) -> VertexAIEvaluationMetricType {
        match self {
            Self::Type(t) => *t,
            Self::Config(c) => c.metric_type,
        }
    }

    /// The configured `metricSpec`, or an empty object.
    pub fn metric_spec(&self) -> Value {
        match self {
            Self::Config(c) if !c.metric_spec.is_null() => c.metric_spec.clone(),
            _ => Value::Object(Default::default()),
        }
    }
}

/// Options specific to evaluation configuration.
#[derive(Debug, Deserialize, Default)]
pub struct EvaluationOptions {
    pub metrics: Vec<VertexAIEvaluationMetric>,
}

/// Plugin options for the Vertex AI evaluation service.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPluginOptions {
    #[serde(flatten)]
    pub common: VertexAIPluginOptions,
    #[serde(flatten)]
    pub evaluation: EvaluationOptions,
}

/// A content policy the Checks classifier can score.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksEvaluationMetricType {
    DangerousContent,
    PiiSolicitingReciting,
    Harassment,
    SexuallyExplicit,
    HateSpeech,
    MedicalInfo,
    ViolenceAndGore,
    ObscenityAndProfanity,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct ChecksEvaluationMetricConfig {
    #[serde(rename = "type")]
    pub metric_type: ChecksEvaluationMetricType,
    /// Score above which the content counts as violating the policy.
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(untagged)]
pub enum ChecksEvaluationMetric {
    Type(ChecksEvaluationMetricType),
    Config(ChecksEvaluationMetricConfig),
}

impl ChecksEvaluationMetric {
    pub fn metric_type(&self) -> ChecksEvaluationMetricType {
        match self {
            Self::Type(t) => *t,
            Self::Config(c) => c.metric_type,
        }
    }

    pub fn threshold(&self) -> Option<f64> {
        match self {
            Self::Type(_) => None,
            Self::Config(c) => c.threshold,
        }
    }
}

/// Plugin options for the Checks classifier.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChecksPluginOptions {
    pub access_token: Option<String>,
    pub metrics: Vec<ChecksEvaluationMetric>,
}

/// The endpoint an evaluator posts its requests to.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationEndpoint {
    /// `projects/{project}/locations/{location}:evaluateInstances`.
    EvaluateInstances { project_id: String, location: String },
    /// `aisafety:classifyContent`.
    ClassifyContent,
}

impl EvaluationEndpoint {
    pub fn url(&self) -> String {
        match self {
            Self::EvaluateInstances {
                project_id,
                location,
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1beta1/projects/{project_id}/locations/{location}:evaluateInstances"
            ),
            Self::ClassifyContent => {
                "https://checks.googleapis.com/v1alpha/aisafety:classifyContent".to_string()
            }
        }
    }

    /// The RPC method name, used in span names.
    pub fn method(&self) -> &'static str {
        match self {
            Self::EvaluateInstances { .. } => "evaluateInstances",
            Self::ClassifyContent => "classifyContent",
        }
    }
}

impl From<&DerivedParams> for EvaluationEndpoint {
    fn from(params: &DerivedParams) -> Self {
        Self::EvaluateInstances {
            project_id: params.project_id.clone(),
            location: params.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metrics_accept_bare_types_and_configs() {
        let metrics: Vec<VertexAIEvaluationMetric> = serde_json::from_value(json!([
            "BLEU",
            { "type": "ROUGE", "metricSpec": { "rougeType": "rougeLsum" } },
        ]))
        .unwrap();
        assert_eq!(metrics[0].metric_type(), VertexAIEvaluationMetricType::Bleu);
        assert_eq!(metrics[0].metric_spec(), json!({}));
        assert_eq!(metrics[1].metric_spec(), json!({ "rougeType": "rougeLsum" }));

        let checks: Vec<ChecksEvaluationMetric> = serde_json::from_value(json!([
            "HATE_SPEECH",
            { "type": "DANGEROUS_CONTENT", "threshold": 0.6 },
        ]))
        .unwrap();
        assert_eq!(checks[0].threshold(), None);
        assert_eq!(checks[1].threshold(), Some(0.6));
        assert_eq!(checks[1].metric_type().to_string(), "DANGEROUS_CONTENT");
    }

    #[test]
    fn endpoint_urls() {
        let endpoint = EvaluationEndpoint::EvaluateInstances {
            project_id: "p".into(),
            location: "us-central1".into(),
        };
        assert_eq!(
            endpoint.url(),
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/p/locations/us-central1:evaluateInstances"
        );
        assert_eq!(EvaluationEndpoint::ClassifyContent.method(), "classifyContent");
    }
}
