use serde::{Deserialize, Serialize};

use super::result::{AnalysisResult, TranscriptionResult};

const DEMO_TRANSCRIPT: &str = "cat dog bird fish elephant lion tiger bear wolf deer rabbit \
squirrel mouse rat hamster guinea pig";

const DEMO_REPORT: &str = "AI Cognitive Assessment - Animal Naming (Demo)
-----------------------------------------------
Total entries:     17
Unique animals:    15
Repetitions:       2
Memory score:      85 / 100
Brain health score:85 / 100

Unique list: cat, dog, bird, fish, elephant, lion, tiger, bear, wolf, deer, rabbit, squirrel, mouse, rat, hamster

Disclaimer: Demo-only. Not clinical-grade. Not for diagnosis.";

const PLACEHOLDER_TRANSCRIPT: &str = "[transcription unavailable]";

const PLACEHOLDER_REPORT: &str = "Analysis unavailable: the scoring service could not be \
reached, so no score was computed for this recording.";

/// What a pipeline stage returns when its remote call fails
///
/// Every variant marks its results `degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationPolicy {
    /// Neutral placeholders with zero confidence and zero scores
    #[default]
    Placeholder,
    /// Fixed sample transcript and scores, for demos without a backend
    DemoData,
}

impl DegradationPolicy {
    pub fn fallback_transcription(&self) -> TranscriptionResult {
        match self {
            Self::Placeholder => TranscriptionResult {
                text: PLACEHOLDER_TRANSCRIPT.to_string(),
                confidence: 0.0,
                degraded: true,
            },
            Self::DemoData => TranscriptionResult {
                text: DEMO_TRANSCRIPT.to_string(),
                confidence: 0.85,
                degraded: true,
            },
        }
    }

    pub fn fallback_analysis(&self) -> AnalysisResult {
        match self {
            Self::Placeholder => AnalysisResult {
                animal_count: 0,
                repetitions: 0,
                memory_score: 0,
                brain_health_score: 0,
                report: PLACEHOLDER_REPORT.to_string(),
                degraded: true,
            },
            Self::DemoData => AnalysisResult {
                animal_count: 15,
                repetitions: 2,
                memory_score: 85,
                brain_health_score: 85,
                report: DEMO_REPORT.to_string(),
                degraded: true,
            },
        }
    }
}
