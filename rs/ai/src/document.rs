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

//! # AI Document and Content Primitives
//!
//! `Part` is the atomic unit of content exchanged with models, tools and
//! retrievers. A part carries exactly one of text, media, a tool request or a
//! tool response; the generated schema enforces that, so a part with two
//! payloads (or none) is rejected wherever it crosses an action boundary.

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;

/// Represents a media item, typically an image, video, or audio file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// The IANA media type of the content (e.g., `image/png`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// The URI of the media content. Can be a `data:`, `http:`, `https:`, or `gs:` URI.
    pub url: String,
}

/// Represents a request from a model to invoke a tool.
#[derive(Default, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    /// An identifier for a specific tool call, used to match a `ToolResponse`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
    /// The name of the tool to be called.
    pub name: String,
    /// The input parameters for the tool, typically a JSON object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// Represents the output of a tool, to be sent back to the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// The identifier of the `ToolRequest` this is a response to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
    /// The name of the tool that was called.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// One piece of content in a `Document` or message.
///
/// Only one payload field may be set. Use the constructors to build valid
/// parts; the struct form exists so that wire data deserializes leniently
/// before it is validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_request: Option<ToolRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponse>,
    /// Additional metadata associated with this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl JsonSchema for Part {
    fn schema_name() -> Cow<'static, str> {
        "Part".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let metadata = generator.subschema_for::<HashMap<String, Value>>();
        let payloads = [
            ("text", generator.subschema_for::<String>()),
            ("media", generator.subschema_for::<Media>()),
            ("toolRequest", generator.subschema_for::<ToolRequest>()),
            ("toolResponse", generator.subschema_for::<ToolResponse>()),
        ];
        let variants: Vec<Value> = payloads
            .into_iter()
            .map(|(key, schema)| {
                serde_json::json!({
                    "type": "object",
                    "required": [key],
                    "properties": {
                        key: schema,
                        "metadata": metadata.clone(),
                    },
                    "additionalProperties": false,
                })
            })
            .collect();
        json_schema!({ "oneOf": variants })
    }
}

impl Part {
    /// Creates a new `Part` from a text string.
    pub fn text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Creates a new `Part` from a media URL.
    pub fn media(url: impl Into<String>, content_type: Option<String>) -> Self {
        Part {
            media: Some(Media {
                url: url.into(),
                content_type,
            }),
            ..Default::default()
        }
    }

    pub fn tool_request(
        name: impl Into<String>,
        input: Option<Value>,
        r#ref: Option<String>,
    ) -> Self {
        Part {
            tool_request: Some(ToolRequest {
                name: name.into(),
                input,
                r#ref,
            }),
            ..Default::default()
        }
    }

    pub fn tool_response(
        name: impl Into<String>,
        output: Option<Value>,
        r#ref: Option<String>,
    ) -> Self {
        Part {
            tool_response: Some(ToolResponse {
                name: name.into(),
                output,
                r#ref,
            }),
            ..Default::default()
        }
    }

    pub fn is_tool_request(&self) -> bool {
        self.tool_request.is_some()
    }
}

/// Content with metadata, as indexed and retrieved by retrievers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Document {
    pub content: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Document {
    pub fn new(content: Vec<Part>, metadata: Option<HashMap<String, Value>>) -> Self {
        Document { content, metadata }
    }

    pub fn from_text(text: impl Into<String>, metadata: Option<HashMap<String, Value>>) -> Self {
        Document::new(vec![Part::text(text)], metadata)
    }

    /// Concatenates all `text` parts in the document.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Returns all `media` parts in the document.
    pub fn media(&self) -> Vec<&Media> {
        self.content
            .iter()
            .filter_map(|p| p.media.as_ref())
            .collect()
    }
}
