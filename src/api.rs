//! Non-streaming analyze client
//!
//! Used by the one-shot `ask` command. Shares the request body and error
//! taxonomy with the streaming transport but waits for the whole answer.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{RaidscopeError, Result};
use crate::transport::http::{truncate_chars, AnalyzeRequest, MAX_ERROR_BODY_CHARS};

/// Body returned by the non-streaming analyze endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Full answer text
    pub answer: String,
    /// Classification tag assigned to the question
    #[serde(default)]
    pub query_type: Option<String>,
}

/// Client for `POST {base_url}{analyze_path}`
///
/// # Examples
///
/// ```no_run
/// use raidscope::api::AnalyzeClient;
/// use raidscope::config::ApiConfig;
///
/// # async fn example() -> raidscope::error::Result<()> {
/// let client = AnalyzeClient::from_config(&ApiConfig::default())?;
/// let response = client.analyze("Which healer overhealed most?").await?;
/// println!("{}", response.answer);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnalyzeClient {
    http_client: Client,
    endpoint: Url,
}

impl AnalyzeClient {
    /// Build a client from the `api` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(api.connect_timeout())
            .timeout(api.request_timeout())
            .build()
            .map_err(RaidscopeError::Request)?;

        Ok(Self {
            http_client,
            endpoint: api.analyze_url()?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Ask a question and wait for the full answer
    ///
    /// # Errors
    ///
    /// - [`RaidscopeError::Transport`] if the request cannot be sent
    /// - [`RaidscopeError::Http`] on a non-success status
    /// - [`RaidscopeError::Api`] if the body is not a valid answer
    pub async fn analyze(&self, question: &str) -> Result<AnalyzeResponse> {
        tracing::debug!(endpoint = %self.endpoint, "Sending analyze request");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&AnalyzeRequest { question })
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Analyze request failed: {}", e);
                RaidscopeError::Transport(format!("analyze request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Analyze endpoint returned {}: {}", status, body);
            return Err(RaidscopeError::Http {
                status: status.as_u16(),
                body: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
            }
            .into());
        }

        let parsed: AnalyzeResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse analyze response: {}", e);
            RaidscopeError::Api(format!("failed to parse analyze response: {}", e))
        })?;

        tracing::debug!(
            query_type = parsed.query_type.as_deref().unwrap_or("-"),
            "Analyze response: {} chars",
            parsed.answer.len()
        );

        Ok(parsed)
    }
}
