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

//! # Model Tooling
//!
//! Tools are ordinary actions registered under `/tool/{name}`. A model is
//! offered a tool through its `ToolDefinition`, and the generate loop invokes
//! it through the registry like any other action.

use async_trait::async_trait;
use genkit_core::action::{
    Action, ActionBuilder, ActionFnArg, ActionMetadata, ActionRunOptions, ErasedAction,
};
use genkit_core::context::ActionContext;
use genkit_core::error::{Error, Result};
use genkit_core::registry::{ActionType, Registry};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// A definition of a tool that can be provided to a model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// A wrapper for a tool `Action` that provides tool-specific functionality.
#[derive(Clone, Debug)]
pub struct ToolAction<I = Value, O = Value>(pub Action<I, O, ()>);

impl<I, O> Deref for ToolAction<I, O> {
    type Target = Action<I, O, ()>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<I, O> ErasedAction for ToolAction<I, O>
where
    I: Serialize + DeserializeOwned + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn metadata(&self) -> &ActionMetadata {
        &self.0.meta
    }

    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value> {
        self.0.run_json(input, options).await
    }
}

impl<I, O> ToolAction<I, O> {
    pub fn definition(&self) -> ToolDefinition {
        to_tool_definition(&self.0.meta)
    }
}

/// A reference to a tool, either by name or as a concrete action.
#[derive(Clone, Debug)]
pub enum ToolArgument {
    Name(String),
    Action(Arc<dyn ErasedAction>),
}

impl From<String> for ToolArgument {
    fn from(s: String) -> Self {
        ToolArgument::Name(s)
    }
}

impl<'a> From<&'a str> for ToolArgument {
    fn from(s: &'a str) -> Self {
        ToolArgument::Name(s.to_string())
    }
}

impl From<Arc<dyn ErasedAction>> for ToolArgument {
    fn from(action: Arc<dyn ErasedAction>) -> Self {
        ToolArgument::Action(action)
    }
}

impl<I, O> From<ToolAction<I, O>> for ToolArgument
where
    I: Serialize + DeserializeOwned + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn from(tool: ToolAction<I, O>) -> Self {
        ToolArgument::Action(Arc::new(tool))
    }
}

/// Defines a new tool and registers it as `/tool/{name}`.
///
/// The handler receives the parsed input and the caller's context.
pub fn define_tool<I, O, F, Fut>(
    registry: &Registry,
    name: &str,
    description: &str,
    runner: F,
) -> Result<ToolAction<I, O>>
where
    I: JsonSchema + Serialize + DeserializeOwned + Send + Sync + 'static,
    O: JsonSchema + Serialize + Send + Sync + 'static,
    F: Fn(I, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    let handler =
        move |input: I, args: ActionFnArg<()>| runner(input, args.context.unwrap_or_default());
    let action = ActionBuilder::new(ActionType::Tool, name, handler)
        .with_description(description)
        .build();
    let tool = ToolAction(action);
    registry.register_action(Arc::new(tool.clone()))?;
    Ok(tool)
}

/// Resolves tool arguments to actions, failing on the first unknown name.
pub fn resolve_tools(
    registry: &Registry,
    tools: &[ToolArgument],
) -> Result<Vec<Arc<dyn ErasedAction>>> {
    tools
        .iter()
        .map(|tool| match tool {
            ToolArgument::Name(name) => registry
                .lookup(ActionType::Tool, name)
                .map_err(|_| Error::ToolNotFound { name: name.clone() }),
            ToolArgument::Action(action) => Ok(action.clone()),
        })
        .collect()
}

/// Converts tool metadata to the `ToolDefinition` wire format.
pub fn to_tool_definition(metadata: &ActionMetadata) -> ToolDefinition {
    ToolDefinition {
        name: metadata.name.clone(),
        description: metadata.description.clone().unwrap_or_default(),
        input_schema: metadata.input_schema.as_ref().map(|s| s.as_value()),
        output_schema: metadata.output_schema.as_ref().map(|s| s.as_value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, Serialize, JsonSchema)]
    struct Add {
        a: i64,
        b: i64,
    }

    #[test]
    fn definition_carries_generated_schemas() {
        let registry = Registry::new();
        let tool = define_tool(
            &registry,
            "add",
            "Adds two numbers.",
            |input: Add, _| async move { Ok(input.a + input.b) },
        )
        .unwrap();

        let definition = tool.definition();
        assert_eq!(definition.name, "add");
        assert_eq!(definition.description, "Adds two numbers.");
        let input_schema = definition.input_schema.unwrap();
        assert_eq!(input_schema["required"], json!(["a", "b"]));
        assert_eq!(definition.output_schema.unwrap()["type"], json!("integer"));
    }

    #[test]
    fn unknown_tool_names_are_reported_by_name() {
        let registry = Registry::new();
        let err = resolve_tools(&registry, &["missing".into()]).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { name } if name == "missing"));
    }
}
