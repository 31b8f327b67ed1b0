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

//! # Genkit Vertex AI Plugin
//!
//! Evaluators for the Vertex AI evaluation service (`evaluateInstances`) and
//! the Checks content classifier (`classifyContent`). Both go through one
//! [`EvaluatorFactory`]: build a request per datapoint, post it through an
//! [`EvaluationTransport`], validate the reply against the metric's schema and
//! map it to a score.

pub mod common;
pub mod evaluation;
pub mod transport;

pub use self::common::{get_derived_params, DerivedParams, VertexAIPluginOptions};
pub use self::evaluation::{
    checks_evaluation, checks_evaluators, vertex_ai_evaluation, vertex_evaluators,
    EvaluationEndpoint, EvaluatorFactory,
};
pub use self::transport::{EvaluationTransport, HttpTransport, TransportError};
