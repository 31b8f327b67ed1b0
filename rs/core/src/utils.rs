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

//! # Utilities
//!
//! Environment detection and JSON helpers shared by the Genkit crates.

use serde_json::Value;
use std::env;

/// Removes object properties whose value is `null`, recursively.
///
/// Provider APIs reject explicit `null` for optional fields, so request bodies
/// are passed through this before they are sent. Nulls inside arrays are kept.
pub fn strip_null_values(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_null_values(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.into_iter().map(strip_null_values).collect()),
        _ => value,
    }
}

/// Returns the current environment that the app code is running in.
///
/// It reads the `GENKIT_ENV` environment variable. If the variable is not set,
/// it defaults to `"prod"`.
pub fn get_current_env() -> String {
    env::var("GENKIT_ENV").unwrap_or_else(|_| "prod".to_string())
}

/// Checks whether the current environment is `dev`.
pub fn is_dev_env() -> bool {
    get_current_env() == "dev"
}
