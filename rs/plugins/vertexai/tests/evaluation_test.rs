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

//! # Evaluation Tests
//!
//! Drives the evaluators through a scripted transport that records every
//! request and answers with a canned body or failure.

use async_trait::async_trait;
use genkit_ai::evaluator::{evaluate, BaseDataPoint, EvalStatusEnum};
use genkit_core::error::Error;
use genkit_core::status::StatusCode;
use genkit_core::tracing::{InMemorySpanExporter, SpanState, Tracer};
use genkit_core::Registry;
use genkit_vertexai::evaluation::types::{
    ChecksEvaluationMetric, ChecksEvaluationMetricConfig, ChecksEvaluationMetricType,
    VertexAIEvaluationMetric, VertexAIEvaluationMetricType,
};
use genkit_vertexai::{
    checks_evaluators, vertex_evaluators, EvaluationEndpoint, EvaluationTransport,
    EvaluatorFactory, TransportError,
};
use rstest::{fixture, rstest};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&Value) -> Result<Value, TransportError> + Send + Sync>;

struct ScriptedTransport {
    respond: Responder,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn replying(body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(body.clone()))
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvaluationTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        (self.respond)(body)
    }
}

const VERTEX_URL: &str = "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/test-project/locations/us-central1:evaluateInstances";
const CHECKS_URL: &str = "https://checks.googleapis.com/v1alpha/aisafety:classifyContent";

fn vertex_endpoint() -> EvaluationEndpoint {
    EvaluationEndpoint::EvaluateInstances {
        project_id: "test-project".to_string(),
        location: "us-central1".to_string(),
    }
}

struct Harness {
    registry: Registry,
    spans: Arc<InMemorySpanExporter>,
}

#[fixture]
fn harness() -> Harness {
    let spans = Arc::new(InMemorySpanExporter::new());
    let registry = Registry::new().with_tracer(Tracer::new().with_exporter(spans.clone()));
    Harness { registry, spans }
}

fn register_vertex(
    registry: &Registry,
    transport: Arc<ScriptedTransport>,
    metric: VertexAIEvaluationMetricType,
) {
    let factory = EvaluatorFactory::new(vertex_endpoint(), transport);
    vertex_evaluators(registry, &factory, &[VertexAIEvaluationMetric::Type(metric)]).unwrap();
}

fn datapoint(id: &str) -> BaseDataPoint {
    BaseDataPoint {
        input: json!("Summarize the report."),
        output: Some(json!("The report says revenue grew.")),
        context: Some(vec![json!("Revenue grew 4%."), json!("Costs were flat.")]),
        reference: Some(json!("Revenue grew.")),
        test_case_id: Some(id.to_string()),
    }
}

#[rstest]
#[tokio::test]
async fn bleu_score_is_reported_for_the_datapoint(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "bleuResults": { "bleuMetricValues": [{ "score": 0.42 }] }
    }));
    register_vertex(&harness.registry, transport.clone(), VertexAIEvaluationMetricType::Bleu);

    let responses = evaluate(&harness.registry, "vertexai/bleu", vec![datapoint("tc-1")], None)
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].test_case_id, "tc-1");
    assert_eq!(responses[0].evaluation.score, Some(json!(0.42)));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, VERTEX_URL);
    assert_eq!(
        calls[0].1["bleuInput"]["instances"][0],
        json!({ "prediction": "The report says revenue grew.", "reference": "Revenue grew." })
    );
    assert_eq!(calls[0].1["bleuInput"]["metricSpec"], json!({}));
}

#[rstest]
#[tokio::test]
async fn pointwise_requests_carry_context_and_instruction(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "summarizationQualityResult": { "score": 4.0, "explanation": "Faithful.", "confidence": 0.8 }
    }));
    register_vertex(
        &harness.registry,
        transport.clone(),
        VertexAIEvaluationMetricType::SummarizationQuality,
    );

    let responses = evaluate(
        &harness.registry,
        "vertexai/summarization_quality",
        vec![datapoint("tc-1")],
        None,
    )
    .await
    .unwrap();

    let evaluation = &responses[0].evaluation;
    assert_eq!(evaluation.score, Some(json!(4.0)));
    assert_eq!(evaluation.details.as_ref().unwrap()["reasoning"], json!("Faithful."));

    let calls = transport.calls();
    let instance = &calls[0].1["summarizationQualityInput"]["instance"];
    assert_eq!(instance["context"], json!("Revenue grew 4%.. Costs were flat."));
    assert_eq!(instance["instruction"], json!("Summarize the report."));
}

#[rstest]
#[tokio::test]
async fn fluency_requests_only_send_the_prediction(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({ "fluencyResult": { "score": 5 } }));
    register_vertex(&harness.registry, transport.clone(), VertexAIEvaluationMetricType::Fluency);

    evaluate(&harness.registry, "vertexai/fluency", vec![datapoint("tc-1")], None)
        .await
        .unwrap();

    let calls = transport.calls();
    let instance = &calls[0].1["fluencyInput"]["instance"];
    assert_eq!(instance["prediction"], json!("The report says revenue grew."));
    assert!(instance["context"].is_null());
    assert!(instance["instruction"].is_null());
}

#[rstest]
#[tokio::test]
async fn pointwise_responses_tolerate_extra_top_level_fields(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "fluencyResult": { "score": 4.0, "explanation": "ok" },
        "modelVersion": "v1"
    }));
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Fluency);

    let responses = evaluate(&harness.registry, "vertexai/fluency", vec![datapoint("tc-1")], None)
        .await
        .unwrap();

    let evaluation = &responses[0].evaluation;
    assert_eq!(evaluation.score, Some(json!(4.0)));
    assert_eq!(evaluation.details.as_ref().unwrap()["reasoning"], json!("ok"));
}

#[rstest]
#[tokio::test]
async fn non_json_body_is_a_parse_error(harness: Harness) {
    let transport = ScriptedTransport::replying(json!("<html>Service Unavailable</html>"));
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Fluency);

    let err = evaluate(&harness.registry, "vertexai/fluency", vec![datapoint("tc-1")], None)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::ResponseParse { url, .. } if url == VERTEX_URL),
        "expected ResponseParse, got {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn response_without_score_is_a_parse_error(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "fluencyResult": { "explanation": "No score here." }
    }));
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Fluency);

    let err = evaluate(&harness.registry, "vertexai/fluency", vec![datapoint("tc-1")], None)
        .await
        .unwrap_err();

    match err {
        Error::ResponseParse { url, source } => {
            assert_eq!(url, VERTEX_URL);
            assert_eq!(source.path(), "/fluencyResult");
        }
        other => panic!("expected ResponseParse, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn empty_bleu_values_are_a_parse_error(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "bleuResults": { "bleuMetricValues": [] }
    }));
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Bleu);

    let err = evaluate(&harness.registry, "vertexai/bleu", vec![datapoint("tc-1")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ResponseParse { .. }), "{err:?}");
}

#[rstest]
#[tokio::test]
async fn transport_failure_is_an_evaluation_request_error(harness: Harness) {
    let transport = ScriptedTransport::new(|_| {
        Err(TransportError::Status {
            status: 503,
            body: "backend unavailable".to_string(),
        })
    });
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Safety);

    let err = evaluate(&harness.registry, "vertexai/safety", vec![datapoint("tc-1")], None)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::Unavailable);
    match err {
        Error::EvaluationRequest { url, message, .. } => {
            assert_eq!(url, VERTEX_URL);
            assert!(message.contains("503"), "{message}");
        }
        other => panic!("expected EvaluationRequest, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn checks_policy_result_becomes_a_score(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "policyResults": [
            { "policyType": "HARASSMENT", "score": 0.91, "violationResult": "VIOLATIVE" }
        ]
    }));
    let factory = EvaluatorFactory::new(EvaluationEndpoint::ClassifyContent, transport.clone());
    let metrics = [ChecksEvaluationMetric::Config(ChecksEvaluationMetricConfig {
        metric_type: ChecksEvaluationMetricType::Harassment,
        threshold: Some(0.4),
    })];
    checks_evaluators(&harness.registry, &factory, &metrics).unwrap();

    let responses = evaluate(&harness.registry, "checks/harassment", vec![datapoint("tc-9")], None)
        .await
        .unwrap();

    let evaluation = &responses[0].evaluation;
    assert_eq!(responses[0].test_case_id, "tc-9");
    assert_eq!(evaluation.score, Some(json!(0.91)));
    assert_eq!(evaluation.status, Some(EvalStatusEnum::Fail));
    assert_eq!(
        evaluation.details,
        Some(json!({ "reasoning": "Status VIOLATIVE" }))
    );

    let calls = transport.calls();
    let (url, body) = &calls[0];
    assert_eq!(url, CHECKS_URL);
    assert_eq!(
        body,
        &json!({
            "input": { "text_input": { "content": "The report says revenue grew." } },
            "policies": [{ "policy_type": "HARASSMENT", "threshold": 0.4 }],
        })
    );
}

#[rstest]
#[tokio::test]
async fn every_datapoint_makes_its_own_traced_call(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({
        "groundednessResult": { "score": 1, "explanation": "Grounded." }
    }));
    register_vertex(
        &harness.registry,
        transport.clone(),
        VertexAIEvaluationMetricType::Groundedness,
    );

    let responses = evaluate(
        &harness.registry,
        "vertexai/groundedness",
        vec![datapoint("a"), datapoint("b")],
        None,
    )
    .await
    .unwrap();
    assert_eq!(transport.calls().len(), 2);

    let call_spans = harness.spans.spans_named("vertexai/groundedness#evaluateInstances");
    assert_eq!(call_spans.len(), 2);
    for response in &responses {
        let test_spans = harness
            .spans
            .spans_named(&format!("Test Case {}", response.test_case_id));
        let test_span = &test_spans[0];
        let call_span = call_spans
            .iter()
            .find(|s| s.parent_span_id.as_deref() == Some(test_span.span_id.as_str()))
            .expect("call span under its test case span");
        assert_eq!(call_span.state(), SpanState::Success);
        assert_eq!(call_span.trace_id, test_span.trace_id);
    }
}

#[rstest]
#[tokio::test]
async fn failed_call_closes_its_span_with_an_error(harness: Harness) {
    let transport = ScriptedTransport::replying(json!({ "unexpected": true }));
    register_vertex(&harness.registry, transport, VertexAIEvaluationMetricType::Rouge);

    let result = evaluate(&harness.registry, "vertexai/rouge", vec![datapoint("tc-1")], None).await;
    assert!(result.is_err());

    let call_spans = harness.spans.spans_named("vertexai/rouge#evaluateInstances");
    assert_eq!(call_spans.len(), 1);
    assert_eq!(call_spans[0].state(), SpanState::Error);
}
