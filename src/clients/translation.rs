/*!
 * Text translation client.
 */

use log::{error, info};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::StageClient;
use crate::cancel::CancelToken;
use crate::errors::{StageError, StageErrorKind};
use crate::transport::{HttpResponse, RequestBody};

/// Request path of the translation operation
pub const TRANSLATE_PATH: &str = "/translate";

/// Field names accepted for the translated text, in order of preference
pub const TRANSLATION_FIELDS: [&str; 2] = ["translated_text", "translation"];

/// Translation request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranslateRequest {
    pub text: String,
    pub options: TranslateOptions,
}

/// Language options of a translation request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranslateOptions {
    pub source_lang: String,
    pub target_lang: String,
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: TranslateOptions {
                source_lang: source_lang.into(),
                target_lang: target_lang.into(),
            },
        }
    }
}

/// Client for the translation service
#[derive(Debug)]
pub struct TranslationClient {
    client: StageClient,
}

impl TranslationClient {
    pub fn new(client: StageClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StageClient {
        &self.client
    }

    /// Translate `text` from `source_lang` to `target_lang`
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancelToken,
    ) -> Result<String, StageError> {
        let payload = serde_json::to_value(TranslateRequest::new(text, source_lang, target_lang))
            .map_err(|e| StageError::new(self.client.service(), TRANSLATE_PATH, 0, StageErrorKind::Parse(e.to_string())))?;

        let invocation = self
            .client
            .invoke(Method::POST, TRANSLATE_PATH, RequestBody::Json(payload), cancel)
            .await?;

        let translation = parse_translation(&invocation.response).map_err(|kind| {
            self.client.record_parse_error();
            error!(
                "Translation failed: source_lang={} target_lang={} text_length={} error={}",
                source_lang,
                target_lang,
                text.chars().count(),
                kind
            );
            StageError::new(self.client.service(), TRANSLATE_PATH, invocation.attempts, kind)
        })?;

        info!(
            "Text translated successfully: source_lang={} target_lang={} text_length={} translation_length={}",
            source_lang,
            target_lang,
            text.chars().count(),
            translation.chars().count()
        );
        Ok(translation)
    }
}

/// Extract the translated text
///
/// `translated_text` wins over `translation` when both are present. A body
/// carrying neither yields an empty string.
pub fn parse_translation(response: &HttpResponse) -> Result<String, StageErrorKind> {
    let value: Value = response
        .parse_json()
        .map_err(|e| StageErrorKind::Parse(format!("response is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| StageErrorKind::Parse("response is not a JSON object".to_string()))?;

    for field in TRANSLATION_FIELDS {
        match object.get(field) {
            None => continue,
            Some(Value::String(text)) => return Ok(text.clone()),
            Some(other) => {
                return Err(StageErrorKind::Parse(format!("field `{}` is not a string: {}", field, other)));
            }
        }
    }

    Ok(String::new())
}
