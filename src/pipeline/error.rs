use thiserror::Error;

/// Pipeline stage failures
///
/// Absorbed by `AssessmentPipeline::transcribe`/`analyze`; only the strict
/// `try_*` variants return them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(String),
}
