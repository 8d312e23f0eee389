//! Minimal Admin GraphQL transport.

use crate::error::{ExportError, GraphqlError};
use crate::types::ExportConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Header carrying the Admin API access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Authenticated client for one shop's Admin GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: String,
}

impl AdminClient {
    /// Builds a client for the shop and token in `config`.
    pub fn new(config: &ExportConfig) -> Result<Self, ExportError> {
        let endpoint = config.graphql_endpoint()?;
        Ok(Self::with_client(
            reqwest::Client::new(),
            endpoint,
            config.access_token.clone(),
        ))
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url, access_token: String) -> Self {
        Self {
            http,
            endpoint,
            access_token,
        }
    }

    /// The GraphQL endpoint this client posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Runs one query or mutation and decodes its `data` into `T`.
    ///
    /// A non-success status, a top-level `errors` array, a missing `data`
    /// field or a `data` of the wrong shape are all errors.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GraphqlError> {
        debug!("POST {} variables={}", self.endpoint, variables);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphqlError::Status {
                endpoint: self.endpoint.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        let mut envelope: Value = serde_json::from_str(&body)
            .map_err(|e| GraphqlError::Malformed(format!("body is not JSON: {}", e)))?;

        if let Some(errors) = envelope.get("errors").filter(|e| !e.is_null()) {
            let messages: Vec<ErrorMessage> = serde_json::from_value(errors.clone())
                .map_err(|e| GraphqlError::Malformed(format!("unreadable errors: {}", e)))?;
            if !messages.is_empty() {
                return Err(GraphqlError::Errors(
                    messages.into_iter().map(|m| m.message).collect(),
                ));
            }
        }

        let data = match envelope.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => {
                return Err(GraphqlError::Malformed("response has no data".to_string()))
            }
            Some(data) => data,
        };

        serde_json::from_value(data)
            .map_err(|e| GraphqlError::Malformed(format!("unexpected data shape: {}", e)))
    }
}
