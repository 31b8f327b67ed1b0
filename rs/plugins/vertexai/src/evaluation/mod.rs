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

//! # Vertex AI Evaluation
//!
//! Evaluators backed by the Vertex AI evaluation service and the Checks
//! content classifier.

mod checks;
mod evaluation;
mod evaluator_factory;
mod index;
pub mod types;

pub use self::checks::checks_evaluators;
pub use self::evaluation::vertex_evaluators;
pub use self::evaluator_factory::EvaluatorFactory;
pub use self::index::{checks_evaluation, vertex_ai_evaluation};
pub use self::types::{
    ChecksEvaluationMetric, ChecksEvaluationMetricConfig, ChecksEvaluationMetricType,
    ChecksPluginOptions, EvaluationEndpoint, EvaluationOptions, EvaluationPluginOptions,
    VertexAIEvaluationMetric, VertexAIEvaluationMetricConfig, VertexAIEvaluationMetricType,
};
