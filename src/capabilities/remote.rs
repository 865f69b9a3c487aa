//! HTTP-backed capability clients.
//!
//! Both clients speak a deliberately neutral JSON shape rather than any
//! vendor API; a thin gateway in front of the hosted model adapts it. All
//! transport failures and non-2xx statuses map to
//! [`PolicyError::ExternalService`] so the pipeline's degradation policy
//! applies uniformly.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::capabilities::{CompletionProvider, EmbeddingProvider};
use crate::types::PolicyError;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding capability served over HTTP.
///
/// Request: `POST {endpoint}` with `{"model": "...", "input": ["...", ...]}`.
/// Response: `{"embeddings": [[f32, ...], ...]}` with one vector per input.
#[derive(Clone, Debug)]
pub struct RemoteEmbeddingClient {
    client: Client,
    endpoint: Url,
    model: String,
}

impl RemoteEmbeddingClient {
    pub fn new(client: Client, endpoint: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingClient {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PolicyError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbedRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != inputs.len() {
            return Err(PolicyError::ExternalService(format!(
                "embedding service returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                inputs.len()
            )));
        }
        Ok(parsed.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompleteResponse {
    text: String,
}

/// Text-completion capability served over HTTP.
///
/// Request: `POST {endpoint}` with `{"model": "...", "prompt": "..."}`.
/// Response: `{"text": "..."}`.
#[derive(Clone, Debug)]
pub struct RemoteCompletionClient {
    client: Client,
    endpoint: Url,
    model: String,
}

impl RemoteCompletionClient {
    pub fn new(client: Client, endpoint: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for RemoteCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, PolicyError> {
        let body = CompleteRequest {
            model: &self.model,
            prompt,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: CompleteResponse = response.json().await?;
        Ok(parsed.text)
    }
}
