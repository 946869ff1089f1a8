/*!
 * Speech recognition client.
 *
 * Uploads audio as multipart form data and reads `{"text": ...}` back.
 */

use bytes::Bytes;
use log::{error, info};
use reqwest::Method;
use serde_json::Value;

use super::StageClient;
use crate::cancel::CancelToken;
use crate::errors::{StageError, StageErrorKind};
use crate::transport::{HttpResponse, MultipartForm, RequestBody};

/// Request path of the transcription operation
pub const TRANSCRIBE_PATH: &str = "/transcribe";

/// Client for the speech recognition service
#[derive(Debug)]
pub struct AsrClient {
    client: StageClient,
}

impl AsrClient {
    pub fn new(client: StageClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StageClient {
        &self.client
    }

    /// Transcribe audio in `language` to text
    pub async fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
        audio_format: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError> {
        let form = transcription_form(Bytes::copy_from_slice(audio), language, audio_format);

        let invocation = self
            .client
            .invoke(Method::POST, TRANSCRIBE_PATH, RequestBody::Multipart(form), cancel)
            .await?;

        let transcription = parse_transcription(&invocation.response).map_err(|kind| {
            self.client.record_parse_error();
            error!(
                "Transcription failed: language={} audio_format={} error={}",
                language, audio_format, kind
            );
            StageError::new(self.client.service(), TRANSCRIBE_PATH, invocation.attempts, kind)
        })?;

        info!(
            "Audio transcribed successfully: language={} audio_format={} transcription_length={}",
            language,
            audio_format,
            transcription.chars().count()
        );
        Ok(transcription)
    }
}

/// Multipart payload: `file` named `audio.<format>` and `options.language`
pub fn transcription_form(audio: Bytes, language: &str, audio_format: &str) -> MultipartForm {
    MultipartForm::new()
        .file("file", format!("audio.{}", audio_format), audio)
        .text("options.language", language)
}

/// Extract the transcription; a missing `text` field yields an empty string
pub fn parse_transcription(response: &HttpResponse) -> Result<String, StageErrorKind> {
    let value: Value = response
        .parse_json()
        .map_err(|e| StageErrorKind::Parse(format!("response is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| StageErrorKind::Parse("response is not a JSON object".to_string()))?;

    match object.get("text") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(StageErrorKind::Parse(format!("field `text` is not a string: {}", other))),
    }
}
