use anyhow::Result;

use super::messages::AnalyzeResponse;
use crate::audio::AudioRef;

/// Remote speech-to-text
#[async_trait::async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio: &AudioRef) -> Result<String>;
}

/// Remote fluency scoring
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalyzeResponse>;
}
