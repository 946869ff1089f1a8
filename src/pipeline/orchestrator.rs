/*!
 * Pipeline orchestrator for speech-to-speech translation.
 *
 * The orchestrator drives the three-stage state machine:
 * 1. ASR: audio in the source language to text
 * 2. Translation: text to text in the target language
 * 3. TTS: translated text to audio
 *
 * Stages run strictly in order. The first failure aborts the run and is
 * attributed to the stage that caused it; no partial output is returned.
 */

use futures::FutureExt;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::stages::{SpeechRecognizer, SpeechSynthesizer, TextTranslator};
use crate::app_config::Config;
use crate::cancel::CancelToken;
use crate::clients::{AsrClient, StageClient, TranslationClient, TtsClient};
use crate::discovery::EndpointResolver;
use crate::errors::{PipelineError, PipelineStage, StageError, StageErrorKind, StageKind};
use crate::language_utils::{audio_content_type, LanguagePair};
use crate::metrics::{PipelineMetrics, PipelineMetricsSnapshot, StageTimings};
use crate::transport::Transport;

/// Input of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    /// Audio in the source language
    pub audio: Vec<u8>,
    pub source_lang: String,
    pub target_lang: String,
    /// Format of both the input and the synthesized audio
    pub audio_format: String,
    /// Voice used for synthesis
    pub voice: String,
}

impl PipelineRequest {
    /// Create a request using the `wav` format and the `default` voice
    pub fn new(audio: Vec<u8>, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            audio,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            audio_format: "wav".to_string(),
            voice: "default".to_string(),
        }
    }

    pub fn with_format(mut self, audio_format: impl Into<String>) -> Self {
        self.audio_format = audio_format.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

/// States of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    AsrDone,
    TranslationDone,
    Done,
    /// Terminal failure state, tagged with the stage that failed
    Aborted(PipelineStage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Synthesized audio in the target language
    pub audio: Vec<u8>,
    /// Content type matching the requested audio format
    pub content_type: &'static str,
    pub timings: StageTimings,
    /// Identifier used in the run's log lines
    pub request_id: String,
}

/// Metadata a transport layer attaches to the response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub processing_time: Duration,
    pub source_language: String,
    pub target_language: String,
    pub content_type: &'static str,
}

impl ResponseMetadata {
    pub fn new(request: &PipelineRequest, output: &PipelineOutput) -> Self {
        Self {
            processing_time: output.timings.total,
            source_language: request.source_lang.clone(),
            target_language: request.target_lang.clone(),
            content_type: output.content_type,
        }
    }

    /// Response headers in the form the HTTP layer sends them
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type.to_string()),
            ("X-Processing-Time", format!("{:.6}", self.processing_time.as_secs_f64())),
            ("X-Source-Language", self.source_language.clone()),
            ("X-Target-Language", self.target_language.clone()),
        ]
    }
}

/// Overall health derived from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every service is healthy
    Ok,
    /// Some services are healthy
    Degraded,
    /// No service is healthy
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Error => "error",
        }
    }
}

/// Health of every stage, computed fresh on each call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub asr: bool,
    pub translation: bool,
    pub tts: bool,
}

impl HealthSnapshot {
    pub fn get(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Asr => self.asr,
            StageKind::Translation => self.translation,
            StageKind::Tts => self.tts,
        }
    }

    /// Stage label to health flag
    pub fn as_map(&self) -> BTreeMap<&'static str, bool> {
        StageKind::ALL.iter().map(|stage| (stage.label(), self.get(*stage))).collect()
    }

    pub fn overall(&self) -> HealthStatus {
        let healthy = StageKind::ALL.iter().filter(|stage| self.get(**stage)).count();
        match healthy {
            3 => HealthStatus::Ok,
            0 => HealthStatus::Error,
            _ => HealthStatus::Degraded,
        }
    }

    /// Ready to accept traffic when at least one service is healthy
    pub fn is_ready(&self) -> bool {
        self.overall() != HealthStatus::Error
    }
}

/// Drives the ASR -> Translation -> TTS pipeline
#[derive(Debug)]
pub struct PipelineOrchestrator {
    recognizer: Arc<dyn SpeechRecognizer>,
    translator: Arc<dyn TextTranslator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    supported_pairs: Option<Vec<LanguagePair>>,
    metrics: PipelineMetrics,
}

impl PipelineOrchestrator {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: Arc<dyn TextTranslator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            recognizer,
            translator,
            synthesizer,
            supported_pairs: None,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Build the three HTTP stage clients from configuration
    ///
    /// All clients share one resolver and one transport.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let resolver = Arc::new(EndpointResolver::with_cluster_domain(
            transport.clone(),
            config.cluster_domain.clone(),
        ));
        let stage_client = |stage: StageKind| {
            StageClient::new(
                config.services.get(stage).to_endpoint(stage),
                resolver.clone(),
                transport.clone(),
            )
        };

        Self::new(
            Arc::new(AsrClient::new(stage_client(StageKind::Asr))),
            Arc::new(TranslationClient::new(stage_client(StageKind::Translation))),
            Arc::new(TtsClient::new(stage_client(StageKind::Tts))),
        )
        .with_supported_pairs(config.supported_language_pairs.clone())
    }

    /// Reject requests whose language pair is not listed
    pub fn with_supported_pairs(mut self, pairs: Vec<LanguagePair>) -> Self {
        self.supported_pairs = Some(pairs);
        self
    }

    pub fn supported_pairs(&self) -> Option<&[LanguagePair]> {
        self.supported_pairs.as_deref()
    }

    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Translate speech and return the synthesized audio
    pub async fn translate_speech(&self, request: &PipelineRequest) -> Result<Vec<u8>, PipelineError> {
        self.run(request, &CancelToken::new()).await.map(|output| output.audio)
    }

    /// Run the pipeline, returning audio together with per-stage timings
    pub async fn run(&self, request: &PipelineRequest, cancel: &CancelToken) -> Result<PipelineOutput, PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut timings = StageTimings::default();
        let mut state = PipelineState::Init;

        self.metrics.record_start();

        let outcome = AssertUnwindSafe(self.execute(request, cancel, &request_id, &mut state, &mut timings))
            .catch_unwind()
            .await;

        timings.total = started.elapsed();

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "stage panicked".to_string());
                state = PipelineState::Aborted(PipelineStage::Pipeline);
                Err(PipelineError::unexpected(message))
            }
        };

        match result {
            Ok(audio) => {
                self.metrics.record_success();
                info!(
                    "[{}] Translation pipeline completed successfully: source_lang={} target_lang={} audio_format={} voice={} input_audio_size={} output_audio_size={} {}",
                    request_id,
                    request.source_lang,
                    request.target_lang,
                    request.audio_format,
                    request.voice,
                    request.audio.len(),
                    audio.len(),
                    timings.summary()
                );
                Ok(PipelineOutput {
                    audio,
                    content_type: audio_content_type(&request.audio_format),
                    timings,
                    request_id,
                })
            }
            Err(e) => {
                self.metrics.record_failure(e.stage);
                error!(
                    "[{}] Translation pipeline failed: state={:?} stage={} error={} details={} {}",
                    request_id, state, e.stage, e, e.details, timings.summary()
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        cancel: &CancelToken,
        request_id: &str,
        state: &mut PipelineState,
        timings: &mut StageTimings,
    ) -> Result<Vec<u8>, PipelineError> {
        if let Some(pairs) = &self.supported_pairs {
            if !pairs.iter().any(|p| p.matches(&request.source_lang, &request.target_lang)) {
                *state = PipelineState::Aborted(PipelineStage::Request);
                return Err(PipelineError::invalid_request(format!(
                    "Unsupported language pair: {} to {}",
                    request.source_lang, request.target_lang
                )));
            }
        }

        info!(
            "[{}] Starting ASR: source_lang={} audio_format={} audio_size={}",
            request_id,
            request.source_lang,
            request.audio_format,
            request.audio.len()
        );
        let transcription = self
            .stage(StageKind::Asr, cancel, state, timings, async {
                self.recognizer
                    .transcribe(&request.audio, &request.source_lang, &request.audio_format, cancel)
                    .await
            })
            .await?;
        *state = PipelineState::AsrDone;

        info!(
            "[{}] Starting translation: source_lang={} target_lang={} text_length={}",
            request_id,
            request.source_lang,
            request.target_lang,
            transcription.chars().count()
        );
        let translation = self
            .stage(StageKind::Translation, cancel, state, timings, async {
                self.translator
                    .translate(&transcription, &request.source_lang, &request.target_lang, cancel)
                    .await
            })
            .await?;
        *state = PipelineState::TranslationDone;

        info!(
            "[{}] Starting TTS: target_lang={} voice={} audio_format={} text_length={}",
            request_id,
            request.target_lang,
            request.voice,
            request.audio_format,
            translation.chars().count()
        );
        let audio = self
            .stage(StageKind::Tts, cancel, state, timings, async {
                self.synthesizer
                    .synthesize(&translation, &request.target_lang, &request.voice, &request.audio_format, cancel)
                    .await
            })
            .await?;
        *state = PipelineState::Done;

        Ok(audio)
    }

    /// Run one stage, timing it and converting its failure into a `PipelineError`
    ///
    /// A cancelled token stops the run before the stage is called.
    async fn stage<T, F>(
        &self,
        stage: StageKind,
        cancel: &CancelToken,
        state: &mut PipelineState,
        timings: &mut StageTimings,
        call: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        if cancel.is_cancelled() {
            *state = PipelineState::Aborted(stage.into());
            let error = StageError::new(stage, stage.label(), 0, StageErrorKind::Cancelled);
            return Err(PipelineError::from_stage(stage, error));
        }

        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        timings.record(stage, elapsed);
        self.metrics.record_stage_latency(stage, elapsed);

        result.map_err(|e| {
            *state = PipelineState::Aborted(stage.into());
            if e.service != stage {
                warn!(
                    "{} stage reported an error labelled {}; attributing to {}",
                    stage.display_name(),
                    e.service,
                    stage
                );
            }
            PipelineError::from_stage(stage, e)
        })
    }

    /// Probe every stage concurrently and wait for all three answers
    pub async fn check_services_health(&self) -> HealthSnapshot {
        let (asr, translation, tts) = tokio::join!(
            self.recognizer.check_health(),
            self.translator.check_health(),
            self.synthesizer.check_health(),
        );

        let snapshot = HealthSnapshot { asr, translation, tts };
        info!(
            "Service health: asr={} translation={} tts={} overall={:?}",
            asr,
            translation,
            tts,
            snapshot.overall()
        );
        snapshot
    }
}
