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

//! # Common Utilities for Vertex AI
//!
//! Plugin options and the resolution of project, location and access token
//! from those options or the environment.

use genkit_core::error::{Error, Result};
use genkit_core::status::StatusCode;
use serde::Deserialize;
use std::env;

pub const DEFAULT_LOCATION: &str = "us-central1";

/// Options for configuring the Vertex AI plugin.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VertexAIPluginOptions {
    pub project_id: Option<String>,
    pub location: Option<String>,
    /// An OAuth2 bearer token. Acquiring it is left to the caller.
    pub access_token: Option<String>,
}

/// The resolved parameters needed to interact with Vertex AI APIs.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedParams {
    pub project_id: String,
    pub location: String,
    pub access_token: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Resolves options against the process environment.
pub fn get_derived_params(options: &VertexAIPluginOptions) -> Result<DerivedParams> {
    derive_params_with(options, |key| env::var(key).ok())
}

/// Resolves options, reading fallbacks through `lookup`.
///
/// The project falls back to `GCLOUD_PROJECT` then `GOOGLE_CLOUD_PROJECT`, the
/// location to `GCLOUD_LOCATION` then `us-central1`, and the token to
/// `GOOGLE_ACCESS_TOKEN`.
pub fn derive_params_with<F>(options: &VertexAIPluginOptions, lookup: F) -> Result<DerivedParams>
where
    F: Fn(&str) -> Option<String>,
{
    let project_id = non_empty(options.project_id.clone())
        .or_else(|| non_empty(lookup("GCLOUD_PROJECT")))
        .or_else(|| non_empty(lookup("GOOGLE_CLOUD_PROJECT")))
        .ok_or_else(|| {
            Error::new_user_facing(
                StatusCode::FailedPrecondition,
                "Vertex AI requires a project id: set `project_id` or GCLOUD_PROJECT",
                None,
            )
        })?;
    let location = non_empty(options.location.clone())
        .or_else(|| non_empty(lookup("GCLOUD_LOCATION")))
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
    let access_token = non_empty(options.access_token.clone())
        .or_else(|| non_empty(lookup("GOOGLE_ACCESS_TOKEN")));

    Ok(DerivedParams {
        project_id,
        location,
        access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn explicit_options_win_over_environment() {
        let options = VertexAIPluginOptions {
            project_id: Some("explicit".into()),
            location: Some("europe-west4".into()),
            access_token: Some("token".into()),
        };
        let params =
            derive_params_with(&options, env_of(&[("GCLOUD_PROJECT", "from-env")])).unwrap();
        assert_eq!(params.project_id, "explicit");
        assert_eq!(params.location, "europe-west4");
        assert_eq!(params.access_token.as_deref(), Some("token"));
    }

    #[test]
    fn environment_fallbacks_apply_in_order() {
        let params = derive_params_with(
            &VertexAIPluginOptions::default(),
            env_of(&[
                ("GCLOUD_PROJECT", ""),
                ("GOOGLE_CLOUD_PROJECT", "cloud-project"),
                ("GOOGLE_ACCESS_TOKEN", "env-token"),
            ]),
        )
        .unwrap();
        assert_eq!(params.project_id, "cloud-project");
        assert_eq!(params.location, DEFAULT_LOCATION);
        assert_eq!(params.access_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn missing_project_is_a_precondition_failure() {
        let err = derive_params_with(&VertexAIPluginOptions::default(), env_of(&[])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FailedPrecondition);
    }
}
