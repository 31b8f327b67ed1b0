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

//! # Embedder Tests

use genkit_ai::embedder::{define_embedder, embed, EmbedRequest, EmbedResponse, Embedding, EmbedderInfo};
use genkit_ai::Document;
use genkit_core::error::Error;
use genkit_core::registry::Registry;
use genkit_core::ErasedAction;
use rstest::{fixture, rstest};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct LengthOptions {
    scale: f32,
}

/// Embeds each document as `[chars * scale, words * scale]`.
#[fixture]
fn registry() -> Registry {
    let registry = Registry::new();
    define_embedder(
        &registry,
        "length",
        EmbedderInfo {
            label: "Length".to_string(),
            dimensions: Some(2),
            supports: vec!["text".to_string()],
        },
        |req: EmbedRequest<LengthOptions>, _| async move {
            let scale = req.options.map(|o| o.scale).unwrap_or(1.0);
            let embeddings = req
                .input
                .iter()
                .map(|doc| {
                    let text = doc.text();
                    Embedding::new(vec![
                        text.chars().count() as f32 * scale,
                        text.split_whitespace().count() as f32 * scale,
                    ])
                })
                .collect();
            Ok(EmbedResponse { embeddings })
        },
    )
    .unwrap();
    registry
}

#[rstest]
#[tokio::test]
async fn each_document_gets_an_embedding_in_order(registry: Registry) {
    let embeddings = embed(
        &registry,
        "length",
        vec![
            Document::from_text("hello world", None),
            Document::from_text("hi", None),
        ],
        Some(LengthOptions { scale: 2.0 }),
    )
    .await
    .unwrap();

    assert_eq!(
        embeddings,
        vec![Embedding::new(vec![22.0, 4.0]), Embedding::new(vec![4.0, 2.0])]
    );
}

#[rstest]
fn info_is_published_in_the_action_metadata(registry: Registry) {
    let action = registry.lookup_action("/embedder/length").unwrap();
    assert_eq!(
        action.metadata().metadata["embedder"],
        json!({ "label": "Length", "dimensions": 2, "supports": ["text"] })
    );
}

#[rstest]
#[tokio::test]
async fn vectors_of_the_wrong_length_are_rejected(registry: Registry) {
    define_embedder(
        &registry,
        "short",
        EmbedderInfo {
            dimensions: Some(3),
            ..Default::default()
        },
        |_: EmbedRequest<LengthOptions>, _| async {
            Ok(EmbedResponse {
                embeddings: vec![Embedding::new(vec![1.0])],
            })
        },
    )
    .unwrap();

    let err = embed(&registry, "short", vec![Document::from_text("x", None)], None::<LengthOptions>)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expected 3"), "{err}");
}

#[rstest]
#[tokio::test]
async fn malformed_options_are_rejected_before_the_embedder_runs(registry: Registry) {
    let err = embed(
        &registry,
        "length",
        vec![Document::from_text("x", None)],
        Some(json!({ "scale": "big" })),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "{err}");
}

#[rstest]
#[tokio::test]
async fn unknown_embedder_is_not_found(registry: Registry) {
    let err = embed(&registry, "nope", vec![], None::<LengthOptions>)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { key } if key == "/embedder/nope"));
}
