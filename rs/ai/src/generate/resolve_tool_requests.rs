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

//! # Tool Request Resolution
//!
//! Executes the tool requests of a model message and builds the tool message
//! that answers them.

use crate::document::{Part, ToolRequest};
use crate::message::{MessageData, Role};
use futures::future::try_join_all;
use genkit_core::action::{ActionRunOptions, ErasedAction};
use genkit_core::error::{Error, Result};
use genkit_core::registry::{ActionType, Registry};
use serde_json::Value;
use std::sync::Arc;

/// Finds the tool for `name` among the offered tools, then in the registry.
pub fn lookup_tool(
    registry: &Registry,
    tools: &[Arc<dyn ErasedAction>],
    name: &str,
) -> Result<Arc<dyn ErasedAction>> {
    if let Some(tool) = tools.iter().find(|t| t.name() == name) {
        return Ok(tool.clone());
    }
    registry
        .lookup(ActionType::Tool, name)
        .map_err(|_| Error::ToolNotFound {
            name: name.to_string(),
        })
}

async fn run_tool(
    tool: Arc<dyn ErasedAction>,
    request: &ToolRequest,
    options: ActionRunOptions<Value>,
) -> Result<Part> {
    let input = request.input.clone().unwrap_or(Value::Null);
    match tool.run_json(input, options).await {
        Ok(output) => Ok(Part::tool_response(
            request.name.clone(),
            Some(output),
            request.r#ref.clone(),
        )),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => Err(Error::Tool {
            name: request.name.clone(),
            source: Box::new(e),
        }),
    }
}

/// Runs every tool request in `message` and returns the tool message.
///
/// All tools are resolved before any of them runs, so an unknown tool fails
/// the turn without side effects. The tools then run concurrently; the
/// responses keep the order of the requests and carry their `ref`. The first
/// failure cancels the remaining calls.
pub async fn resolve_tool_requests(
    registry: &Registry,
    tools: &[Arc<dyn ErasedAction>],
    message: &MessageData,
    options: &ActionRunOptions<Value>,
) -> Result<MessageData> {
    let requests = message.tool_requests();
    let resolved = requests
        .iter()
        .map(|request| lookup_tool(registry, tools, &request.name))
        .collect::<Result<Vec<_>>>()?;

    let calls = requests
        .into_iter()
        .zip(resolved)
        .map(|(request, tool)| run_tool(tool, request, options.clone()));
    let responses = try_join_all(calls).await?;

    Ok(MessageData::new(Role::Tool, responses))
}
