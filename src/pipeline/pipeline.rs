use std::sync::Arc;
use tracing::{info, warn};

use super::error::PipelineError;
use super::policy::DegradationPolicy;
use super::result::{AnalysisResult, AssessmentOutcome, TranscriptionResult};
use super::service::{AnalysisService, TranscriptionService};
use crate::audio::AudioRef;

/// Turns a finished recording into an assessment: transcribe, then analyze
///
/// Stage failures never escape `transcribe`/`analyze`/`run`; the configured
/// `DegradationPolicy` supplies a result flagged `degraded` instead.
pub struct AssessmentPipeline {
    transcriber: Arc<dyn TranscriptionService>,
    analyzer: Arc<dyn AnalysisService>,
    policy: DegradationPolicy,
}

impl AssessmentPipeline {
    pub fn new(
        transcriber: Arc<dyn TranscriptionService>,
        analyzer: Arc<dyn AnalysisService>,
        policy: DegradationPolicy,
    ) -> Self {
        Self {
            transcriber,
            analyzer,
            policy,
        }
    }

    pub fn policy(&self) -> DegradationPolicy {
        self.policy
    }

    /// Transcription stage without fallback
    pub async fn try_transcribe(&self, audio: &AudioRef) -> Result<TranscriptionResult, PipelineError> {
        let text = self
            .transcriber
            .transcribe(audio)
            .await
            .map_err(|e| PipelineError::TranscriptionUnavailable(format!("{:#}", e)))?;

        Ok(TranscriptionResult {
            text,
            confidence: 1.0,
            degraded: false,
        })
    }

    /// Analysis stage without fallback
    pub async fn try_analyze(&self, text: &str) -> Result<AnalysisResult, PipelineError> {
        let response = self
            .analyzer
            .analyze(text)
            .await
            .map_err(|e| PipelineError::AnalysisUnavailable(format!("{:#}", e)))?;

        AnalysisResult::try_from(response)
            .map_err(|e| PipelineError::AnalysisUnavailable(format!("{:#}", e)))
    }

    pub async fn transcribe(&self, audio: &AudioRef) -> TranscriptionResult {
        info!("Transcribing {}", audio);

        match self.try_transcribe(audio).await {
            Ok(result) => {
                info!("Transcription completed ({} chars)", result.text.len());
                result
            }
            Err(e) => {
                warn!("{}; using {:?} fallback", e, self.policy);
                self.policy.fallback_transcription()
            }
        }
    }

    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        info!("Analyzing transcript ({} chars)", text.len());

        match self.try_analyze(text).await {
            Ok(result) => {
                info!(
                    "Analysis completed: {} animals, {} repetitions, brain health {}",
                    result.animal_count, result.repetitions, result.brain_health_score
                );
                result
            }
            Err(e) => {
                warn!("{}; using {:?} fallback", e, self.policy);
                self.policy.fallback_analysis()
            }
        }
    }

    /// Both stages in order; analysis always runs on whatever text transcription produced
    pub async fn run(&self, audio: &AudioRef) -> AssessmentOutcome {
        info!("Starting transcription and analysis pipeline");

        let transcription = self.transcribe(audio).await;
        let analysis = self.analyze(&transcription.text).await;

        let outcome = AssessmentOutcome {
            transcription,
            analysis,
        };

        if outcome.is_degraded() {
            warn!(
                "Pipeline finished with degraded results (transcription: {}, analysis: {})",
                outcome.transcription.degraded, outcome.analysis.degraded
            );
        } else {
            info!("Pipeline completed successfully");
        }

        outcome
    }
}
