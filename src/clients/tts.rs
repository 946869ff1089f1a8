/*!
 * Speech synthesis client.
 */

use log::info;
use reqwest::Method;
use serde::Serialize;

use super::StageClient;
use crate::cancel::CancelToken;
use crate::errors::{StageError, StageErrorKind};
use crate::transport::RequestBody;

/// Request path of the synthesis operation
pub const SYNTHESIZE_PATH: &str = "/synthesize";

/// Synthesis request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SynthesizeRequest {
    pub text: String,
    pub language: String,
    pub voice: String,
    pub audio_format: String,
}

/// Client for the speech synthesis service
#[derive(Debug)]
pub struct TtsClient {
    client: StageClient,
}

impl TtsClient {
    pub fn new(client: StageClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StageClient {
        &self.client
    }

    /// Synthesize `text` and return the raw audio bytes
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, StageError> {
        let request = SynthesizeRequest {
            text: text.to_string(),
            language: language.to_string(),
            voice: voice.to_string(),
            audio_format: audio_format.to_string(),
        };
        let payload = serde_json::to_value(request)
            .map_err(|e| StageError::new(self.client.service(), SYNTHESIZE_PATH, 0, StageErrorKind::Parse(e.to_string())))?;

        let invocation = self
            .client
            .invoke(Method::POST, SYNTHESIZE_PATH, RequestBody::Json(payload), cancel)
            .await?;

        let audio = invocation.response.body.to_vec();
        info!(
            "Text synthesized successfully: language={} voice={} audio_format={} text_length={} audio_size={}",
            language,
            voice,
            audio_format,
            text.chars().count(),
            audio.len()
        );
        Ok(audio)
    }
}
