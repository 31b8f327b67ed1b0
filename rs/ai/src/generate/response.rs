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

//! # Generate Response
//!
//! The result of an orchestrated `generate` call.

use crate::document::ToolRequest;
use crate::message::MessageData;
use crate::model::{CandidateData, FinishReason, GenerateRequest, GenerationUsage};
use serde::Serialize;
use serde_json::Value;

/// Represents the result of a `generate()` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// The final model message.
    pub message: MessageData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_message: Option<String>,
    /// Usage summed over every model call of the orchestrated call.
    pub usage: GenerationUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    /// All candidates of the final model call.
    pub candidates: Vec<CandidateData>,
    /// The last request sent to the model.
    pub request: GenerateRequest,
}

impl GenerateResponse {
    /// Concatenated text of the final message.
    pub fn text(&self) -> String {
        self.message.text()
    }

    /// Tool requests left unexecuted in the final message. Only non-empty
    /// when the call was made with `return_tool_requests`.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.message.tool_requests()
    }

    /// The full conversation: every message sent to the model on the last
    /// turn, followed by the final message.
    pub fn messages(&self) -> Vec<MessageData> {
        let mut history = self.request.messages.clone();
        history.push(self.message.clone());
        history
    }
}
