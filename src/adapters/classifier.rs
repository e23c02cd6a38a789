//! HTTP client for the misinformation classifier service.
//!
//! Endpoint: POST <url> `{"message": ...}`
//! Auth: optional Bearer token

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::{Classification, Classifier};

/// Classifier service client
pub struct HttpClassifier {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    message: &'a str,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token (e.g. an identity token for a private deployment)
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, message: &str) -> Result<Classification> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { message });

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach classifier")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Classifier returned status {}: {}", status, text.trim());
        }

        response
            .json()
            .await
            .context("Failed to parse classifier response")
    }
}
