/*!
 * Stage capabilities consumed by the orchestrator.
 *
 * Each trait describes one hop of the pipeline. The HTTP stage clients
 * implement them; tests substitute in-memory implementations.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::cancel::CancelToken;
use crate::clients::{AsrClient, TranslationClient, TtsClient};
use crate::errors::StageError;

/// Speech to text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + Debug {
    /// Transcribe `audio` spoken in `language`
    async fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError>;

    /// Whether the backing service answers its health probe
    async fn check_health(&self) -> bool;
}

/// Text to text
#[async_trait]
pub trait TextTranslator: Send + Sync + Debug {
    /// Translate `text` between two languages
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError>;

    async fn check_health(&self) -> bool;
}

/// Text to speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Synthesize `text` in `language` with the given voice and audio format
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, StageError>;

    async fn check_health(&self) -> bool;
}

#[async_trait]
impl SpeechRecognizer for AsrClient {
    async fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError> {
        AsrClient::transcribe(self, audio, language, audio_format, cancel).await
    }

    async fn check_health(&self) -> bool {
        self.client().check_health().await
    }
}

#[async_trait]
impl TextTranslator for TranslationClient {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError> {
        TranslationClient::translate(self, text, source_lang, target_lang, cancel).await
    }

    async fn check_health(&self) -> bool {
        self.client().check_health().await
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, StageError> {
        TtsClient::synthesize(self, text, language, voice, audio_format, cancel).await
    }

    async fn check_health(&self) -> bool {
        self.client().check_health().await
    }
}
