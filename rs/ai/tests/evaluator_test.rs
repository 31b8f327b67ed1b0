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

//! # Evaluator Tests

mod helpers;

use genkit_ai::evaluator::{define_evaluator, evaluate, BaseDataPoint, EvaluatorInfo, Score};
use genkit_ai::EvalStatusEnum;
use genkit_core::error::Error;
use genkit_core::registry::ActionType;
use genkit_core::tracing::SpanState;
use helpers::traced_registry;
use serde_json::json;
use std::time::Duration;

fn datapoint(id: &str, output: &str) -> BaseDataPoint {
    BaseDataPoint {
        input: json!("What is the capital of France?"),
        output: Some(json!(output)),
        test_case_id: Some(id.to_string()),
        ..Default::default()
    }
}

fn info() -> EvaluatorInfo {
    EvaluatorInfo {
        display_name: "Exact match".to_string(),
        definition: "Passes when the output is Paris.".to_string(),
        is_billed: false,
    }
}

#[tokio::test]
async fn scores_every_datapoint_in_its_own_span() {
    let (registry, spans) = traced_registry();
    define_evaluator(&registry, "exact", info(), |dp| async move {
        // Reverse completion order to show responses keep dataset order.
        let delay = if dp.test_case_id == "a" { 30 } else { 1 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let pass = dp.output == Some(json!("Paris"));
        Ok(Score::new(pass).with_status(if pass {
            EvalStatusEnum::Pass
        } else {
            EvalStatusEnum::Fail
        }))
    })
    .unwrap();

    let responses = evaluate(
        &registry,
        "exact",
        vec![datapoint("a", "Paris"), datapoint("b", "Lyon")],
        Some("run-1".to_string()),
    )
    .await
    .unwrap();

    let ids: Vec<&str> = responses.iter().map(|r| r.test_case_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(responses[0].evaluation.score, Some(json!(true)));
    assert_eq!(responses[1].evaluation.status, Some(EvalStatusEnum::Fail));

    let evaluator_spans = spans.spans_named("exact");
    let evaluator_span = &evaluator_spans[0];
    for response in &responses {
        let test_spans = spans.spans_named(&format!("Test Case {}", response.test_case_id));
        let span = &test_spans[0];
        assert_eq!(response.trace_id.as_deref(), Some(span.trace_id.as_str()));
        assert_eq!(response.span_id.as_deref(), Some(span.span_id.as_str()));
        assert_eq!(span.parent_span_id.as_deref(), Some(evaluator_span.span_id.as_str()));
        assert_eq!(span.state(), SpanState::Success);
    }
    assert_eq!(
        evaluator_span.attributes["genkit:metadata:subtype"],
        ActionType::Evaluator.as_str()
    );
}

#[tokio::test]
async fn datapoints_without_ids_get_generated_ones() {
    let (registry, _spans) = traced_registry();
    define_evaluator(&registry, "constant", info(), |_| async { Ok(Score::new(1)) }).unwrap();

    let dataset = vec![BaseDataPoint {
        input: json!("hi"),
        ..Default::default()
    }];
    let responses = evaluate(&registry, "constant", dataset, None).await.unwrap();

    assert_eq!(responses.len(), 1);
    assert!(!responses[0].test_case_id.is_empty());
}

#[tokio::test]
async fn a_failing_datapoint_fails_the_run() {
    let (registry, spans) = traced_registry();
    define_evaluator(&registry, "picky", info(), |dp| async move {
        if dp.test_case_id == "bad" {
            return Err(Error::new_provider("scoring backend unavailable"));
        }
        Ok(Score::new(1))
    })
    .unwrap();

    let err = evaluate(
        &registry,
        "picky",
        vec![datapoint("good", "Paris"), datapoint("bad", "Paris")],
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    let failed = spans.spans_named("Test Case bad");
    assert_eq!(failed[0].state(), SpanState::Error);
}

#[tokio::test]
async fn unknown_evaluators_are_not_found() {
    let (registry, _spans) = traced_registry();
    let err = evaluate(&registry, "missing", vec![], None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { key } if key == "/evaluator/missing"));
}
