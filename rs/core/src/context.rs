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

//! # Action Context
//!
//! Side-channel data that travels with an action invocation (auth and other
//! request information). The context is kept in a `tokio::task_local!` so
//! nested actions, such as tools called by the generate loop, see the context
//! of the call that started them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

tokio::task_local! {
    /// Task-local storage for the current `ActionContext`.
    pub static CONTEXT: ActionContext;
}

/// Action side channel data, like auth and other invocation context information.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ActionContext {
    /// Information about the currently authenticated user if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
    /// Additional context data.
    #[serde(flatten)]
    pub additional_context: HashMap<String, Value>,
}

impl ActionContext {
    /// Merges `other` into this context. `auth` is replaced only if `other`
    /// carries one.
    pub fn extend(&mut self, other: ActionContext) {
        if other.auth.is_some() {
            self.auth = other.auth;
        }
        self.additional_context.extend(other.additional_context);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == "auth" {
            self.auth.as_ref()
        } else {
            self.additional_context.get(key)
        }
    }
}

impl From<HashMap<String, Value>> for ActionContext {
    fn from(mut map: HashMap<String, Value>) -> Self {
        let auth = map.remove("auth");
        ActionContext {
            auth,
            additional_context: map,
        }
    }
}

/// Runs `fut` with `context` as the current action context.
pub async fn run_with_context<F, R>(context: ActionContext, fut: F) -> R
where
    F: Future<Output = R>,
{
    CONTEXT.scope(context, fut).await
}

/// The context of the action the current task is running, if any.
pub fn get_context() -> Option<ActionContext> {
    CONTEXT.try_with(ActionContext::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn nested_tasks_see_the_outer_context() {
        assert!(get_context().is_none());
        let context = ActionContext::from(HashMap::from([
            ("auth".to_string(), json!({"uid": "user-1"})),
            ("locale".to_string(), json!("en")),
        ]));

        let seen = run_with_context(context.clone(), async { get_context() }).await;
        assert_eq!(seen, Some(context));
    }

    #[test]
    fn extend_keeps_auth_when_other_has_none() {
        let mut base = ActionContext {
            auth: Some(json!({"uid": "a"})),
            ..Default::default()
        };
        base.extend(ActionContext::from(HashMap::from([(
            "trace".to_string(),
            json!(true),
        )])));
        assert_eq!(base.get("auth"), Some(&json!({"uid": "a"})));
        assert_eq!(base.get("trace"), Some(&json!(true)));
    }
}
