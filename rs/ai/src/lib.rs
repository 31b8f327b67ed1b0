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

//! # Genkit AI
//!
//! Generative AI building blocks on top of `genkit-core`: the content model
//! (parts, messages, documents), model, tool, embedder, retriever, indexer and
//! evaluator actions, and the `generate` loop that ties models and tools together.

pub mod document;
pub mod embedder;
pub mod evaluator;
pub mod generate;
pub mod message;
pub mod model;
pub mod retriever;
pub mod tool;

pub use document::{Document, Media, Part, ToolRequest, ToolResponse};
pub use embedder::{define_embedder, embed, EmbedResponse, Embedding, EmbedderInfo};
pub use evaluator::{
    define_evaluator, evaluate, BaseDataPoint, BaseEvalDataPoint, EvalResponse, EvalStatusEnum,
    EvaluatorAction as Evaluator, EvaluatorInfo, Score,
};
pub use generate::{
    generate, generate_stream, GenerateOptions, GenerateResponse, GenerateResponseChunk,
    GenerateStreamResponse, DEFAULT_MAX_TURNS,
};
pub use message::{MessageData, Role};
pub use model::{
    define_model, DefineModelOptions, FinishReason, GenerateRequest, GenerateResponseChunkData,
    GenerateResponseData, GenerationUsage, ModelAction as Model, ModelInfoSupports,
};
pub use retriever::{define_indexer, define_retriever, index, retrieve, RetrieverResponse};
pub use tool::{define_tool, ToolAction as Tool, ToolArgument, ToolDefinition};
