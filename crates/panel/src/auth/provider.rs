// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity provider boundary: form-encoded POSTs to the code-pair and token
//! endpoints.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthConfig, ALEXA_SCOPE};

/// Which provider endpoint a form goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEndpoint {
    CodePair,
    Token,
}

/// `application/x-www-form-urlencoded` body as ordered pairs.
pub type Form = Vec<(&'static str, String)>;

/// Raw provider reply. Anything but HTTP 200 is a rejection whose body is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Transport to the identity provider.
pub trait IdentityProvider: Send + Sync + 'static {
    fn post_form(
        &self,
        endpoint: ProviderEndpoint,
        form: Form,
    ) -> impl Future<Output = anyhow::Result<ProviderResponse>> + Send;
}

/// Code-pair reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePairResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds between polls.
    pub interval: u64,
    /// Seconds until the code pair expires.
    pub expires_in: u64,
}

/// Token reply (device-code exchange or refresh).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// `scope_data` JSON identifying the product and this device.
pub fn scope_data(product_id: &str, device_serial: &str) -> String {
    serde_json::json!({
        ALEXA_SCOPE: {
            "productID": product_id,
            "productInstanceAttributes": { "deviceSerialNumber": device_serial }
        }
    })
    .to_string()
}

pub fn code_pair_form(client_id: &str, product_id: &str, device_serial: &str) -> Form {
    vec![
        ("response_type", "device_code".to_owned()),
        ("client_id", client_id.to_owned()),
        ("scope", ALEXA_SCOPE.to_owned()),
        ("scope_data", scope_data(product_id, device_serial)),
    ]
}

pub fn device_token_form(device_code: &str, user_code: &str) -> Form {
    vec![
        ("grant_type", "device_code".to_owned()),
        ("device_code", device_code.to_owned()),
        ("user_code", user_code.to_owned()),
    ]
}

pub fn refresh_form(refresh_token: &str, client_id: &str) -> Form {
    vec![
        ("grant_type", "refresh_token".to_owned()),
        ("refresh_token", refresh_token.to_owned()),
        ("client_id", client_id.to_owned()),
    ]
}

/// `reqwest`-backed provider.
pub struct HttpProvider {
    client: reqwest::Client,
    code_pair_url: String,
    token_url: String,
}

impl HttpProvider {
    /// Needs a process-wide rustls crypto provider to be installed.
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            code_pair_url: config.code_pair_url.clone(),
            token_url: config.token_url.clone(),
        })
    }

    fn url(&self, endpoint: ProviderEndpoint) -> &str {
        match endpoint {
            ProviderEndpoint::CodePair => &self.code_pair_url,
            ProviderEndpoint::Token => &self.token_url,
        }
    }
}

impl IdentityProvider for HttpProvider {
    async fn post_form(
        &self,
        endpoint: ProviderEndpoint,
        form: Form,
    ) -> anyhow::Result<ProviderResponse> {
        let resp = self.client.post(self.url(endpoint)).form(&form).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(ProviderResponse { status, body })
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
