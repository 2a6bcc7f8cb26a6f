// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh-grant wire types and the single exchange call.

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Default OAuth token endpoint for the refresh grant.
pub const DEFAULT_TOKEN_URL: &str = "https://api.workos.com/user_management/authenticate";

/// Default OAuth client id presented with the refresh grant.
pub const DEFAULT_CLIENT_ID: &str = "client_01HNM792M5G5G1A2THWPXKFMXB";

/// Token endpoint response. Both tokens are optional on the wire; a
/// missing access token is reported by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// Non-blank access token, if present.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Non-blank rotated refresh token, if present.
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Where and as whom to run the refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEndpoint {
    pub token_url: String,
    pub client_id: String,
}

impl Default for RefreshEndpoint {
    fn default() -> Self {
        Self { token_url: DEFAULT_TOKEN_URL.to_owned(), client_id: DEFAULT_CLIENT_ID.to_owned() }
    }
}

/// Perform a single refresh-grant exchange.
///
/// Statuses other than 200 and transport failures map to
/// [`CredentialError::RefreshExchangeFailed`]. A 200 body that is not JSON is
/// treated as a response without an access token.
pub async fn exchange(
    client: &reqwest::Client,
    endpoint: &RefreshEndpoint,
    refresh_token: &str,
) -> Result<TokenResponse, CredentialError> {
    let resp = client
        .post(&endpoint.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", endpoint.client_id.as_str()),
        ])
        .send()
        .await
        .map_err(|e| CredentialError::RefreshExchangeFailed(format!("request failed: {e}")))?;

    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let text = resp.text().await.unwrap_or_default();
        let text: String = text.chars().take(200).collect();
        return Err(CredentialError::RefreshExchangeFailed(format!("HTTP {status}: {text}")));
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| CredentialError::RefreshExchangeFailed(format!("reading response: {e}")))?;
    Ok(serde_json::from_slice(&body).unwrap_or_default())
}
