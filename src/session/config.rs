use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::SampleConfig;

/// Configuration for the session controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Countdown tick period
    /// Default: 1 second (one tick per remaining second)
    pub tick_period: Duration,

    /// Format requested from the capture adapter
    pub sample_config: SampleConfig,

    /// Capacity of the state-notification channel; slow subscribers lag past this
    pub update_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            sample_config: SampleConfig::default(), // mono, 16-bit, 44.1kHz
            update_buffer: 256,
        }
    }
}
