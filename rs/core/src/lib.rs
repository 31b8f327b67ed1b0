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

//! # Genkit Core
//!
//! Typed actions and the machinery around them: the action registry, schema
//! validation at action boundaries, scoped span recording, streaming and
//! cancellation primitives, and the shared error type.

pub mod action;
pub mod async_utils;
pub mod context;
pub mod error;
pub mod logging;
pub mod registry;
pub mod schema;
pub mod status;
pub mod telemetry;
pub mod tracing;
pub mod utils;

// Re-export key components for easier access.
pub use action::{
    define_action, Action, ActionBuilder, ActionFn, ActionFnArg, ActionMetadata,
    ActionRunOptions, ErasedAction,
};
pub use async_utils::{stream_channel, streaming_callback, ChunkSender, StreamingCallback};
pub use context::ActionContext;
pub use error::{Error, Result};
pub use registry::{ActionType, Registry};
pub use schema::{ProvidedSchema, ValidationError};
pub use status::{Status, StatusCode};
pub use tracing::{in_new_span, SpanHandle, TraceContext, Tracer};
