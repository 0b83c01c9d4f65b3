use anyhow::{Context, Result};
use reqwest::multipart;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::messages::{AnalyzeRequest, AnalyzeResponse, TranscriptionResponse};
use super::service::{AnalysisService, TranscriptionService};
use crate::audio::AudioRef;
use crate::config::BackendConfig;

/// Client for the assessment backend (`/transcribe`, `/analyze`)
#[derive(Debug, Clone)]
pub struct HttpAssessmentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAssessmentClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        // Without a timeout an unreachable backend would hang the pipeline
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        info!("Assessment backend: {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the backend answers at all (`GET /docs`)
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.url("docs")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("Assessment backend not available: {}", e);
                false
            }
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

#[async_trait::async_trait]
impl TranscriptionService for HttpAssessmentClient {
    async fn transcribe(&self, audio: &AudioRef) -> Result<String> {
        let path = audio
            .to_path()
            .with_context(|| format!("Audio reference {} is not a local file", audio))?;

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read recording {:?}", path))?;

        debug!("Uploading {} bytes for transcription", bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.url("transcribe"))
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let resp = ensure_success(resp, "Transcription").await?;
        let body: TranscriptionResponse = resp
            .json()
            .await
            .context("Invalid transcription response")?;

        Ok(body.transcription.trim().to_string())
    }
}

#[async_trait::async_trait]
impl AnalysisService for HttpAssessmentClient {
    async fn analyze(&self, text: &str) -> Result<AnalyzeResponse> {
        let resp = self
            .client
            .post(self.url("analyze"))
            .json(&AnalyzeRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .context("Analysis request failed")?;

        let resp = ensure_success(resp, "Analysis").await?;
        resp.json().await.context("Invalid analysis response")
    }
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{} failed: HTTP {} {}", what, status.as_u16(), body.trim())
}

/// Validate the configured URL and strip any trailing slash
fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        anyhow::bail!(
            "Invalid backend URL: must start with http:// or https://\nGot: {}",
            trimmed
        );
    }

    let after_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or("");
    if after_scheme.is_empty() || after_scheme.starts_with('/') {
        anyhow::bail!("Invalid backend URL: missing host\nGot: {}", trimmed);
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert!(normalize_base_url("localhost:8000").is_err());
        assert!(normalize_base_url("http:///path").is_err());
    }
}
