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

//! # Streaming Generation Chunk
//!
//! A `GenerateResponseChunk` is one piece of a streamed generation, tagged
//! with the index of the message it belongs to within the orchestrated call.

use crate::document::{Part, ToolResponse};
use crate::message::Role;
use crate::model::GenerateResponseChunkData;
use serde::Serialize;
use serde_json::Value;

/// Represents a chunk of a streaming response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseChunk {
    /// Index of the message this chunk belongs to. Model turns and tool
    /// turns each take one index, in the order they occur.
    pub index: u32,
    pub role: Role,
    pub content: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    /// Chunks already delivered for the same message.
    #[serde(skip)]
    pub previous_chunks: Vec<GenerateResponseChunkData>,
}

impl GenerateResponseChunk {
    pub fn new(
        data: GenerateResponseChunkData,
        index: u32,
        previous_chunks: Vec<GenerateResponseChunkData>,
    ) -> Self {
        Self {
            index,
            role: data.role.unwrap_or(Role::Model),
            content: data.content,
            custom: data.custom,
            previous_chunks,
        }
    }

    /// Concatenates all `text` parts present in the chunk.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Concatenates all `text` parts of all preceding chunks.
    pub fn previous_text(&self) -> String {
        self.previous_chunks
            .iter()
            .flat_map(|c| &c.content)
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Text of the message so far, this chunk included.
    pub fn accumulated_text(&self) -> String {
        let mut text = self.previous_text();
        text.push_str(&self.text());
        text
    }

    pub fn tool_responses(&self) -> Vec<&ToolResponse> {
        self.content
            .iter()
            .filter_map(|p| p.tool_response.as_ref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_text_across_chunks() {
        let previous = vec![
            GenerateResponseChunkData::text("Hello"),
            GenerateResponseChunkData::text(", "),
        ];
        let chunk = GenerateResponseChunk::new(GenerateResponseChunkData::text("world"), 0, previous);
        assert_eq!(chunk.role, Role::Model);
        assert_eq!(chunk.text(), "world");
        assert_eq!(chunk.previous_text(), "Hello, ");
        assert_eq!(chunk.accumulated_text(), "Hello, world");
    }
}
