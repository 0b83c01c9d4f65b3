use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::messages::AnalyzeResponse;

/// Output of the transcription stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    /// Produced by the degradation policy, not by the backend
    pub degraded: bool,
}

/// Output of the analysis stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub animal_count: u32,
    pub repetitions: u32,
    /// 0 to 100
    pub memory_score: u8,
    /// 0 to 100
    pub brain_health_score: u8,
    pub report: String,
    /// Produced by the degradation policy, not by the backend
    pub degraded: bool,
}

impl AnalysisResult {
    pub fn score_level(&self) -> ScoreLevel {
        ScoreLevel::from_score(self.brain_health_score)
    }
}

impl TryFrom<AnalyzeResponse> for AnalysisResult {
    type Error = anyhow::Error;

    fn try_from(resp: AnalyzeResponse) -> Result<Self> {
        Ok(Self {
            animal_count: count("animal_count", resp.animal_count)?,
            repetitions: count("repetitions", resp.repetitions)?,
            memory_score: score("memory_score", resp.memory_score)?,
            brain_health_score: score("brain_health_score", resp.brain_health_score)?,
            report: resp.report,
            degraded: false,
        })
    }
}

fn count(field: &str, value: i64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) => Ok(v),
        Err(_) => bail!("{} out of range: {}", field, value),
    }
}

fn score(field: &str, value: i64) -> Result<u8> {
    if !(0..=100).contains(&value) {
        bail!("{} must be between 0 and 100, got {}", field, value);
    }
    Ok(value as u8)
}

/// Coarse band for a brain health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    Growing,
    Learning,
    SharpMind,
    BrainAthlete,
    BrainMaster,
}

impl ScoreLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::BrainMaster,
            80..=89 => Self::BrainAthlete,
            70..=79 => Self::SharpMind,
            60..=69 => Self::Learning,
            _ => Self::Growing,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BrainMaster => "Brain Master",
            Self::BrainAthlete => "Brain Athlete",
            Self::SharpMind => "Sharp Mind",
            Self::Learning => "Learning",
            Self::Growing => "Growing",
        }
    }
}

/// Both stages of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub transcription: TranscriptionResult,
    pub analysis: AnalysisResult,
}

impl AssessmentOutcome {
    /// Some part of the result did not come from the live backend
    pub fn is_degraded(&self) -> bool {
        self.transcription.degraded || self.analysis.degraded
    }
}
