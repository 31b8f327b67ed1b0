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

//! # Schema Definition and Validation
//!
//! Declared shapes are JSON Schema documents, either generated from Rust types
//! with `schemars` or supplied as raw JSON. Values crossing an action or
//! provider boundary are checked with `jsonschema` before they are turned into
//! typed values.

use jsonschema::Draft;
use schemars::{JsonSchema, Schema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// An error that occurs during schema validation.
///
/// Carries every violation reported by the validator together with the
/// offending data and the schema it was checked against. The first violation
/// is available through [`ValidationError::path`], [`ValidationError::expected`]
/// and [`ValidationError::actual`].
#[derive(ThisError, Debug, Clone, Serialize)]
pub struct ValidationError {
    errors: Vec<ValidationErrorDetail>,
    data: Value,
    schema: Value,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema validation failed.")?;
        for error in &self.errors {
            write!(f, "\n- {}", error)?;
        }
        Ok(())
    }
}

impl ValidationError {
    pub fn new(errors: Vec<ValidationErrorDetail>, data: Value, schema: Value) -> Self {
        Self {
            errors,
            data,
            schema,
        }
    }

    /// Returns a slice of the detailed validation errors.
    pub fn errors(&self) -> &[ValidationErrorDetail] {
        &self.errors
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// JSON pointer of the first mismatching value.
    pub fn path(&self) -> &str {
        self.errors.first().map(|e| e.path.as_str()).unwrap_or("")
    }

    /// What the schema required at the first mismatch.
    pub fn expected(&self) -> &str {
        self.errors.first().map(|e| e.expected.as_str()).unwrap_or("")
    }

    /// The value actually found at the first mismatch.
    pub fn actual(&self) -> &str {
        self.errors.first().map(|e| e.actual.as_str()).unwrap_or("")
    }
}

/// Contains details for a single schema validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorDetail {
    /// The JSON pointer path to the field that failed validation.
    pub path: String,
    /// The JSON pointer path to the schema keyword that rejected the value.
    pub schema_path: String,
    /// The failing keyword with its schema value, e.g. `type: "number"`.
    pub expected: String,
    /// The rejected value, rendered as JSON.
    pub actual: String,
    /// A message describing the validation failure.
    pub message: String,
}

impl Display for ValidationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "path: `{}`, message: `{}`", path, self.message)
    }
}

/// A wrapper for different ways a schema can be provided.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum ProvidedSchema {
    /// A schema derived from a Rust type implementing `JsonSchema`.
    FromType(Schema),
    /// A raw JSON schema value.
    Raw(Value),
}

impl ProvidedSchema {
    /// The schema generated for `T`.
    pub fn of<T: JsonSchema>() -> Self {
        ProvidedSchema::FromType(schema_for::<T>())
    }

    pub fn as_value(&self) -> Value {
        match self {
            ProvidedSchema::FromType(schema) => schema.as_value().clone(),
            ProvidedSchema::Raw(value) => value.clone(),
        }
    }
}

impl From<Value> for ProvidedSchema {
    fn from(value: Value) -> Self {
        ProvidedSchema::Raw(value)
    }
}

impl From<Schema> for ProvidedSchema {
    fn from(schema: Schema) -> Self {
        ProvidedSchema::FromType(schema)
    }
}

/// Generates a `Schema` for a given type that implements `JsonSchema`.
pub fn schema_for<T: JsonSchema>() -> Schema {
    schemars::schema_for!(T)
}

fn describe_expected(schema: &Value, schema_path: &str) -> String {
    let keyword = schema_path.rsplit('/').next().unwrap_or_default();
    match schema.pointer(schema_path) {
        Some(Value::Array(variants)) if keyword == "oneOf" || keyword == "anyOf" => {
            format!("{}: {} variants", keyword, variants.len())
        }
        Some(value) => format!("{}: {}", keyword, value),
        None => keyword.to_string(),
    }
}

/// Checks `data` against `schema` without deserializing it.
pub fn validate_value(schema: &ProvidedSchema, data: &Value) -> Result<(), Box<ValidationError>> {
    let schema_value = schema.as_value();
    let validator = match jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema_value)
    {
        Ok(validator) => validator,
        Err(e) => {
            let detail = ValidationErrorDetail {
                path: String::new(),
                schema_path: e.schema_path.to_string(),
                expected: "a valid JSON schema".to_string(),
                actual: e.instance.to_string(),
                message: format!("invalid schema: {}", e),
            };
            return Err(Box::new(ValidationError::new(
                vec![detail],
                data.clone(),
                schema_value,
            )));
        }
    };

    let details: Vec<ValidationErrorDetail> = validator
        .iter_errors(data)
        .map(|e| {
            let schema_path = e.schema_path.to_string();
            ValidationErrorDetail {
                path: e.instance_path.to_string(),
                expected: describe_expected(&schema_value, &schema_path),
                actual: e.instance.to_string(),
                message: e.to_string(),
                schema_path,
            }
        })
        .collect();

    if details.is_empty() {
        Ok(())
    } else {
        Err(Box::new(ValidationError::new(
            details,
            data.clone(),
            schema_value,
        )))
    }
}

/// Validates `data` against `schema`, then deserializes it into `T`.
///
/// A value that passes the schema but still cannot be deserialized into `T`
/// is reported as a validation failure at the root path, so callers only ever
/// see one failure type for malformed input.
pub fn parse_schema<T: DeserializeOwned>(
    data: Value,
    schema: &ProvidedSchema,
) -> Result<T, Box<ValidationError>> {
    validate_value(schema, &data)?;
    serde_json::from_value(data.clone()).map_err(|e| {
        let detail = ValidationErrorDetail {
            path: String::new(),
            schema_path: String::new(),
            expected: std::any::type_name::<T>().to_string(),
            actual: data.to_string(),
            message: e.to_string(),
        };
        Box::new(ValidationError::new(vec![detail], data, schema.as_value()))
    })
}

/// Validates and deserializes `data` using the schema generated for `T`.
pub fn parse<T: DeserializeOwned + JsonSchema>(data: Value) -> Result<T, Box<ValidationError>> {
    parse_schema(data, &ProvidedSchema::of::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Gablorken {
        value: i64,
        over: f64,
    }

    #[test]
    fn parses_matching_value() {
        let parsed: Gablorken = parse(json!({"value": 2, "over": 3.5})).unwrap();
        assert_eq!(parsed, Gablorken { value: 2, over: 3.5 });
    }

    #[test]
    fn reports_first_mismatch() {
        let err = parse::<Gablorken>(json!({"value": "two", "over": 3.5})).unwrap_err();
        assert_eq!(err.path(), "/value");
        assert!(err.expected().starts_with("type"), "{}", err.expected());
        assert_eq!(err.actual(), "\"two\"");
    }

    #[test]
    fn reports_missing_required_field() {
        let schema = ProvidedSchema::Raw(json!({
            "type": "object",
            "required": ["score"],
            "properties": {"score": {"type": "number"}}
        }));
        let err = validate_value(&schema, &json!({"explanation": "n/a"})).unwrap_err();
        assert_eq!(err.path(), "");
        assert_eq!(err.expected(), "required: [\"score\"]");
        assert!(err.to_string().contains("score"));
    }

    #[test]
    fn invalid_schema_is_a_validation_error() {
        let schema = ProvidedSchema::Raw(json!({"type": 12}));
        let err = validate_value(&schema, &json!(1)).unwrap_err();
        assert!(err.errors()[0].message.starts_with("invalid schema"));
    }
}
