/*!
 * Mock stage implementations for orchestrator tests
 *
 * Each mock records the arguments it was called with and answers with a
 * predetermined outcome, so tests can assert both the data flow between
 * stages and which stages ran at all.
 */

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use neuralbabel::cancel::CancelToken;
use neuralbabel::errors::{StageError, StageErrorKind, StageKind};
use neuralbabel::pipeline::{SpeechRecognizer, SpeechSynthesizer, TextTranslator};

/// Outcome a mock stage produces
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Succeed(T),
    Fail(StageError),
    Panic(&'static str),
}

impl<T: Clone> Outcome<T> {
    fn produce(&self) -> Result<T, StageError> {
        match self {
            Outcome::Succeed(value) => Ok(value.clone()),
            Outcome::Fail(error) => Err(error.clone()),
            Outcome::Panic(message) => panic!("{}", message),
        }
    }
}

/// Health answer after an optional delay
#[derive(Debug, Clone, Copy)]
pub struct HealthBehavior {
    pub healthy: bool,
    pub delay: Duration,
}

impl HealthBehavior {
    pub fn new(healthy: bool, delay: Duration) -> Self {
        Self { healthy, delay }
    }

    async fn answer(&self) -> bool {
        tokio::time::sleep(self.delay).await;
        self.healthy
    }
}

impl Default for HealthBehavior {
    fn default() -> Self {
        Self::new(true, Duration::ZERO)
    }
}

/// HTTP 500 failure reported by `service`
pub fn http_failure(service: StageKind, operation: &str) -> StageError {
    StageError::new(
        service,
        operation,
        1,
        StageErrorKind::Http {
            status: 500,
            body: "internal error".to_string(),
        },
    )
}

/// Arguments of one transcribe call
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeCall {
    pub audio: Vec<u8>,
    pub language: String,
    pub audio_format: String,
}

/// Mock speech recognizer
#[derive(Debug)]
pub struct MockRecognizer {
    outcome: Outcome<String>,
    health: HealthBehavior,
    calls: Mutex<Vec<TranscribeCall>>,
}

impl MockRecognizer {
    pub fn new(outcome: Outcome<String>) -> Self {
        Self {
            outcome,
            health: HealthBehavior::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(text: &str) -> Self {
        Self::new(Outcome::Succeed(text.to_string()))
    }

    pub fn with_health(mut self, health: HealthBehavior) -> Self {
        self.health = health;
        self
    }

    pub fn calls(&self) -> Vec<TranscribeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
        audio_format: &str,
        _cancel: &CancelToken,
    ) -> Result<String, StageError> {
        self.calls.lock().unwrap().push(TranscribeCall {
            audio: audio.to_vec(),
            language: language.to_string(),
            audio_format: audio_format.to_string(),
        });
        self.outcome.produce()
    }

    async fn check_health(&self) -> bool {
        self.health.answer().await
    }
}

/// Arguments of one translate call
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateCall {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Mock text translator
#[derive(Debug)]
pub struct MockTranslator {
    outcome: Outcome<String>,
    health: HealthBehavior,
    calls: Mutex<Vec<TranslateCall>>,
}

impl MockTranslator {
    pub fn new(outcome: Outcome<String>) -> Self {
        Self {
            outcome,
            health: HealthBehavior::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(text: &str) -> Self {
        Self::new(Outcome::Succeed(text.to_string()))
    }

    pub fn with_health(mut self, health: HealthBehavior) -> Self {
        self.health = health;
        self
    }

    pub fn calls(&self) -> Vec<TranslateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        _cancel: &CancelToken,
    ) -> Result<String, StageError> {
        self.calls.lock().unwrap().push(TranslateCall {
            text: text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        });
        self.outcome.produce()
    }

    async fn check_health(&self) -> bool {
        self.health.answer().await
    }
}

/// Arguments of one synthesize call
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizeCall {
    pub text: String,
    pub language: String,
    pub voice: String,
    pub audio_format: String,
}

/// Mock speech synthesizer
#[derive(Debug)]
pub struct MockSynthesizer {
    outcome: Outcome<Vec<u8>>,
    health: HealthBehavior,
    calls: Mutex<Vec<SynthesizeCall>>,
}

impl MockSynthesizer {
    pub fn new(outcome: Outcome<Vec<u8>>) -> Self {
        Self {
            outcome,
            health: HealthBehavior::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(audio: &[u8]) -> Self {
        Self::new(Outcome::Succeed(audio.to_vec()))
    }

    pub fn with_health(mut self, health: HealthBehavior) -> Self {
        self.health = health;
        self
    }

    pub fn calls(&self) -> Vec<SynthesizeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
        audio_format: &str,
        _cancel: &CancelToken,
    ) -> Result<Vec<u8>, StageError> {
        self.calls.lock().unwrap().push(SynthesizeCall {
            text: text.to_string(),
            language: language.to_string(),
            voice: voice.to_string(),
            audio_format: audio_format.to_string(),
        });
        self.outcome.produce()
    }

    async fn check_health(&self) -> bool {
        self.health.answer().await
    }
}
