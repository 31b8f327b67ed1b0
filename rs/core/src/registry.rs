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

//! # Genkit Registry
//!
//! The `Registry` owns every registered action for the lifetime of the
//! process. It is created once at startup, filled during registration and
//! shared read-mostly afterwards; clones share the same state. Lookups take a
//! read lock only, so concurrent invocations never block each other.

use crate::action::{ActionRunOptions, ErasedAction};
use crate::error::{Error, Result};
use crate::tracing::Tracer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};
use std::sync::{Arc, PoisonError, RwLock};

/// The kind of a runnable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Embedder,
    Evaluator,
    Indexer,
    Model,
    Retriever,
    Tool,
    Util,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Embedder => "embedder",
            ActionType::Evaluator => "evaluator",
            ActionType::Indexer => "indexer",
            ActionType::Model => "model",
            ActionType::Retriever => "retriever",
            ActionType::Tool => "tool",
            ActionType::Util => "util",
        }
    }

    /// Registry key of the action `name` of this kind, e.g. `/model/echo`.
    pub fn key(self, name: &str) -> String {
        format!("/{}/{}", self.as_str(), name)
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct RegistryState {
    actions: BTreeMap<String, Arc<dyn ErasedAction>>,
}

/// The central registry for Genkit actions.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<RwLock<RegistryState>>,
    tracer: Option<Tracer>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.read().actions.keys().cloned().collect();
        f.debug_struct("Registry")
            .field("actions", &keys)
            .field("tracer", &self.tracer)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the spans of every invocation through this registry with
    /// `tracer` instead of the global one.
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// The tracer used for spans opened on behalf of this registry.
    pub fn tracer(&self) -> Tracer {
        self.tracer.clone().unwrap_or_else(Tracer::current)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an action under its key (`/{type}/{name}`).
    ///
    /// Fails with [`Error::DuplicateAction`] if the key is taken; the existing
    /// action is left in place.
    pub fn register_action(&self, action: Arc<dyn ErasedAction>) -> Result<()> {
        let key = action.metadata().key();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.actions.contains_key(&key) {
            return Err(Error::DuplicateAction { key });
        }
        log::debug!("Registering action '{}'", key);
        state.actions.insert(key, action);
        Ok(())
    }

    /// Looks an action up by its full key, e.g. `/tool/gablorken`.
    pub fn lookup_action(&self, key: &str) -> Result<Arc<dyn ErasedAction>> {
        self.read()
            .actions
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                key: key.to_string(),
            })
    }

    pub fn lookup(&self, action_type: ActionType, name: &str) -> Result<Arc<dyn ErasedAction>> {
        self.lookup_action(&action_type.key(name))
    }

    /// Keys of all registered actions, sorted.
    pub fn list_actions(&self) -> Vec<String> {
        self.read().actions.keys().cloned().collect()
    }

    /// Invokes the action registered under `key` with a JSON input.
    pub async fn invoke(&self, key: &str, input: Value) -> Result<Value> {
        self.invoke_with_options(key, input, ActionRunOptions::default())
            .await
    }

    /// Invokes the action registered under `key`.
    ///
    /// The input is validated before the handler runs and the output before it
    /// is returned; see [`crate::action::Action`]. The call is recorded as a
    /// span named after the action.
    pub async fn invoke_with_options(
        &self,
        key: &str,
        input: Value,
        mut options: ActionRunOptions<Value>,
    ) -> Result<Value> {
        let action = self.lookup_action(key)?;
        if options.tracer.is_none() {
            options.tracer = self.tracer.clone();
        }
        action.run_json(input, options).await
    }
}
