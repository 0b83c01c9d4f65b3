//! Assessment pipeline
//!
//! Sends a finished recording through the backend in two stages:
//! - `POST /transcribe` - speech to text
//! - `POST /analyze` - animal count, repetitions and scores
//!
//! Each stage degrades to a flagged fallback result when the backend fails.

mod client;
mod error;
pub mod messages;
mod pipeline;
mod policy;
mod result;
mod service;

pub use client::HttpAssessmentClient;
pub use error::PipelineError;
pub use messages::{AnalyzeRequest, AnalyzeResponse, TranscriptionResponse};
pub use pipeline::AssessmentPipeline;
pub use policy::DegradationPolicy;
pub use result::{AnalysisResult, AssessmentOutcome, ScoreLevel, TranscriptionResult};
pub use service::{AnalysisService, TranscriptionService};
