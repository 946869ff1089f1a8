use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::discovery::{ServiceEndpoint, DEFAULT_CLUSTER_DOMAIN};
use crate::errors::{ConfigError, StageKind};
use crate::language_utils::{self, LanguagePair};

/// Application configuration module
/// This module handles loading, validating and saving the settings of the
/// three downstream services and the pipeline defaults.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Downstream service settings
    #[serde(default)]
    pub services: ServicesConfig,

    /// DNS suffix appended to `<name>.<namespace>`
    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,

    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub default_source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub default_target_language: String,

    /// Language pairs requests may use
    #[serde(default = "language_utils::default_language_pairs")]
    pub supported_language_pairs: Vec<LanguagePair>,

    /// Audio format used when a request does not name one
    #[serde(default = "default_audio_format")]
    pub default_audio_format: String,

    /// Voice used when a request does not name one
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings for the three services
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServicesConfig {
    #[serde(default = "default_asr_service")]
    pub asr: ServiceConfig,

    #[serde(default = "default_translation_service")]
    pub translation: ServiceConfig,

    #[serde(default = "default_tts_service")]
    pub tts: ServiceConfig,
}

impl ServicesConfig {
    pub fn get(&self, stage: StageKind) -> &ServiceConfig {
        match stage {
            StageKind::Asr => &self.asr,
            StageKind::Translation => &self.translation,
            StageKind::Tts => &self.tts,
        }
    }

    pub fn get_mut(&mut self, stage: StageKind) -> &mut ServiceConfig {
        match stage {
            StageKind::Asr => &mut self.asr,
            StageKind::Translation => &mut self.translation,
            StageKind::Tts => &mut self.tts,
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            asr: default_asr_service(),
            translation: default_translation_service(),
            tts: default_tts_service(),
        }
    }
}

/// Settings of one downstream service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Service name in the cluster
    pub name: String,

    /// Namespace the service lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Fixed address that bypasses cluster DNS
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Retries after the first attempt, only for timeouts
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay in seconds, doubled on each retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
        }
    }

    /// Build the endpoint description the stage client is created from
    pub fn to_endpoint(&self, stage: StageKind) -> ServiceEndpoint {
        let timeout = Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_timeout_secs()));
        let backoff = Duration::try_from_secs_f64(self.backoff_factor)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_backoff_factor()));

        let endpoint = ServiceEndpoint::new(stage, self.name.clone(), self.namespace.clone())
            .with_timeout(timeout)
            .with_max_retries(self.retries)
            .with_backoff_base(backoff);

        match self.endpoint.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => endpoint.with_override(address),
            _ => endpoint,
        }
    }

    fn validate(&self, stage: StageKind) -> Result<()> {
        let field = |name: &str| format!("services.{}.{}", stage.label(), name);

        if self.name.trim().is_empty() {
            return Err(invalid(field("name"), "must not be empty"));
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(invalid(field("timeout_secs"), format!("must be positive, got {}", self.timeout_secs)));
        }
        if self.retries > MAX_RETRIES {
            return Err(invalid(
                field("retries"),
                format!("must be at most {}, got {}", MAX_RETRIES, self.retries),
            ));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 0.0) {
            return Err(invalid(
                field("backoff_factor"),
                format!("must not be negative, got {}", self.backoff_factor),
            ));
        }
        if let Some(address) = self.endpoint.as_deref().filter(|a| !a.trim().is_empty()) {
            let url = Url::parse(address.trim())
                .map_err(|e| invalid(field("endpoint"), format!("{}: {}", address, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(
                    field("endpoint"),
                    format!("unsupported scheme `{}` in {}", url.scheme(), address),
                ));
            }
        }
        Ok(())
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Upper bound on configured retries
pub const MAX_RETRIES: u32 = 10;

fn default_asr_service() -> ServiceConfig {
    ServiceConfig::new("kube-whisperer")
}

fn default_translation_service() -> ServiceConfig {
    ServiceConfig::new("lexi-shift")
}

fn default_tts_service() -> ServiceConfig {
    ServiceConfig::new("vox-raga")
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    0.5
}

fn default_cluster_domain() -> String {
    DEFAULT_CLUSTER_DOMAIN.to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_audio_format() -> String {
    "wav".to_string()
}

fn default_voice() -> String {
    "default".to_string()
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    })
}

/// Environment variable prefix of a stage
fn env_prefix(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Asr => "ASR",
        StageKind::Translation => "TRANSLATION",
        StageKind::Tts => "TTS",
    }
}

impl Config {
    /// Load a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the file at `path`, writing a default one first if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }

        let config = Config::default();
        config.save_to_file(path)?;
        info!("Created default configuration file: {}", path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).context(format!("Failed to create config file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `<STAGE>_SERVICE_ENDPOINT`, `<STAGE>_SERVICE_NAME` and
    /// `<STAGE>_SERVICE_NAMESPACE` from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides looked up through `lookup`; empty values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: String| lookup(&key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        for stage in StageKind::ALL {
            let prefix = env_prefix(stage);
            let service = self.services.get_mut(stage);

            if let Some(endpoint) = value(format!("{}_SERVICE_ENDPOINT", prefix)) {
                info!("Using {} endpoint from environment: {}", stage.display_name(), endpoint);
                service.endpoint = Some(endpoint);
            }
            if let Some(name) = value(format!("{}_SERVICE_NAME", prefix)) {
                service.name = name;
            }
            if let Some(namespace) = value(format!("{}_SERVICE_NAMESPACE", prefix)) {
                service.namespace = namespace;
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::validate_language_code(&self.default_source_language)
            .map_err(|e| invalid("default_source_language", e.to_string()))?;
        language_utils::validate_language_code(&self.default_target_language)
            .map_err(|e| invalid("default_target_language", e.to_string()))?;

        for stage in StageKind::ALL {
            self.services.get(stage).validate(stage)?;
        }

        if self.cluster_domain.trim().is_empty() {
            return Err(invalid("cluster_domain", "must not be empty"));
        }

        if self.supported_language_pairs.is_empty() {
            return Err(invalid("supported_language_pairs", "at least one pair is required"));
        }
        for pair in &self.supported_language_pairs {
            for code in [&pair.source, &pair.target] {
                language_utils::validate_language_code(code)
                    .map_err(|e| invalid("supported_language_pairs", e.to_string()))?;
            }
        }

        let default_pair_supported = self
            .supported_language_pairs
            .iter()
            .any(|p| p.matches(&self.default_source_language, &self.default_target_language));
        if !default_pair_supported {
            return Err(invalid(
                "default_target_language",
                format!(
                    "default pair {} -> {} is not a supported language pair",
                    self.default_source_language, self.default_target_language
                ),
            ));
        }

        if language_utils::audio_content_type(&self.default_audio_format) == "application/octet-stream" {
            warn!(
                "Default audio format `{}` has no known content type; responses will use application/octet-stream",
                self.default_audio_format
            );
        }

        Ok(())
    }

    /// Whether `source -> target` is a supported pair
    pub fn is_supported_pair(&self, source: &str, target: &str) -> bool {
        self.supported_language_pairs.iter().any(|p| p.matches(source, target))
    }

    /// Shorthand for the validated endpoint of `stage`
    pub fn endpoint(&self, stage: StageKind) -> ServiceEndpoint {
        self.services.get(stage).to_endpoint(stage)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        (&self.log_level).into()
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            services: ServicesConfig::default(),
            cluster_domain: default_cluster_domain(),
            default_source_language: default_source_language(),
            default_target_language: default_target_language(),
            supported_language_pairs: language_utils::default_language_pairs(),
            default_audio_format: default_audio_format(),
            default_voice: default_voice(),
            log_level: LogLevel::default(),
        }
    }
}
