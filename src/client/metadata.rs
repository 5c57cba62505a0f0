// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project metadata served by the collector for an API key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SdkError;

/// Path of the metadata endpoint, relative to `root_url`.
pub const METADATA_PATH: &str = "/api/client_metadata";

/// What the collector knows about the project an API key belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub pubsub_project_id: String,
    #[serde(default)]
    pub topic_id: String,
    #[serde(default)]
    pub pubsub_push_service_account: Value,
}

/// `GET {root_url}/api/client_metadata` authenticated with `api_key`.
pub async fn fetch_client_metadata(
    http: &reqwest::Client,
    root_url: &str,
    api_key: &str,
) -> Result<ClientMetadata, SdkError> {
    let url = format!("{}{}", root_url.trim_end_matches('/'), METADATA_PATH);

    let response = http
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| SdkError::Metadata(format!("unable to query {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SdkError::Metadata(format!("{url} responded with {status}: {body}")));
    }

    response
        .json::<ClientMetadata>()
        .await
        .map_err(|e| SdkError::Metadata(format!("unable to decode client metadata: {e}")))
}
