use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::DegradationPolicy;
use crate::session::SessionSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub backend: BackendConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "fluency-recorder".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Where captured WAV files are written
    pub recordings_path: PathBuf,
    /// WAV file streamed as microphone input; silence when unset
    pub source: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            recordings_path: PathBuf::from("recordings"),
            source: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub duration_seconds: u32,
    pub tick_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 60,
            tick_millis: 1000,
        }
    }
}

impl SessionConfig {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            tick_period: Duration::from_millis(self.tick_millis.max(1)),
            ..SessionSettings::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub degradation: DegradationPolicy,
}

impl Config {
    /// Load `path` (any extension the config crate knows, optional) and
    /// `FLUENCY__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("FLUENCY").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load("config/does-not-exist").unwrap();

        assert_eq!(cfg.service.http.port, 8787);
        assert_eq!(cfg.session.duration_seconds, 60);
        assert_eq!(cfg.session.settings().tick_period, Duration::from_secs(1));
        assert_eq!(cfg.backend.base_url, "http://127.0.0.1:8000");
        assert_eq!(cfg.pipeline.degradation, DegradationPolicy::Placeholder);
        assert!(cfg.audio.source.is_none());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/fluency-recorder");
        let cfg = Config::load(path).unwrap();

        assert_eq!(cfg.service.name, "fluency-recorder");
        assert_eq!(cfg.backend.request_timeout_secs, 30);
    }
}
