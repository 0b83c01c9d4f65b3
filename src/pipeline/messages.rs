use serde::{Deserialize, Serialize};

/// Response from `POST /transcribe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(alias = "text")]
    pub transcription: String,
}

/// Body of `POST /analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// Response from `POST /analyze`
///
/// Kept signed so out-of-range values from the backend are reported as such
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub animal_count: i64,
    pub repetitions: i64,
    pub memory_score: i64,
    pub brain_health_score: i64,
    pub report: String,
}
