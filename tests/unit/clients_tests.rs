/*!
 * Tests for the ASR, translation and TTS clients over a scripted transport
 */

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use neuralbabel::cancel::CancelToken;
use neuralbabel::clients::{AsrClient, TranslationClient, TtsClient};
use neuralbabel::errors::{StageErrorKind, StageKind};
use neuralbabel::transport::RequestBody;

use crate::common;
use crate::common::mock_transport::{MockReply, ScriptedTransport};

fn asr(transport: &Arc<ScriptedTransport>) -> AsrClient {
    AsrClient::new(common::stage_client(
        transport.clone(),
        common::test_endpoint(StageKind::Asr, 3, Duration::from_millis(500)),
    ))
}

fn translator(transport: &Arc<ScriptedTransport>) -> TranslationClient {
    TranslationClient::new(common::stage_client(
        transport.clone(),
        common::test_endpoint(StageKind::Translation, 3, Duration::from_millis(500)),
    ))
}

fn tts(transport: &Arc<ScriptedTransport>) -> TtsClient {
    TtsClient::new(common::stage_client(
        transport.clone(),
        common::test_endpoint(StageKind::Tts, 3, Duration::from_millis(500)),
    ))
}

#[tokio::test]
async fn test_asrTranscribe_shouldUploadMultipartAudio() {
    let transport = Arc::new(
        ScriptedTransport::new().always("/transcribe", MockReply::json(200, json!({"text": "Hello, world!"}))),
    );

    let text = asr(&transport)
        .transcribe(b"RIFF-audio", "en", "wav", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(text, "Hello, world!");

    let requests = transport.requests_to("/transcribe");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.method, reqwest::Method::POST);
    assert_eq!(requests[0].request.url, "http://asr.test/transcribe");
    match &requests[0].request.body {
        RequestBody::Multipart(form) => {
            let (file_name, data) = form.file_value("file").unwrap();
            assert_eq!(file_name, "audio.wav");
            assert_eq!(data.as_ref(), b"RIFF-audio");
            assert_eq!(form.text_value("options.language"), Some("en"));
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_asrTranscribe_withoutTextField_shouldReturnEmptyString() {
    let transport = Arc::new(ScriptedTransport::new().always("/transcribe", MockReply::json(200, json!({}))));

    let text = asr(&transport)
        .transcribe(b"audio", "en", "wav", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_asrTranscribe_withInvalidJson_shouldFailWithParseError() {
    let transport = Arc::new(ScriptedTransport::new().always("/transcribe", MockReply::status(200, "not json")));
    let client = asr(&transport);

    let error = client
        .transcribe(b"audio", "en", "wav", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error.kind, StageErrorKind::Parse(_)));
    assert_eq!(error.service, StageKind::Asr);
    assert_eq!(error.attempts, 1);
    assert_eq!(client.client().metrics().error_count("parse"), 1);
}

#[tokio::test]
async fn test_translate_shouldSendNestedOptions() {
    let transport = Arc::new(
        ScriptedTransport::new().always("/translate", MockReply::json(200, json!({"translated_text": "Bonjour, monde!"}))),
    );

    let translation = translator(&transport)
        .translate("Hello, world!", "en", "fr", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(translation, "Bonjour, monde!");

    let requests = transport.requests_to("/translate");
    assert_eq!(
        requests[0].request.body,
        RequestBody::Json(json!({
            "text": "Hello, world!",
            "options": {"source_lang": "en", "target_lang": "fr"}
        }))
    );
}

#[tokio::test]
async fn test_translate_withLegacyField_shouldReadTranslation() {
    let transport = Arc::new(ScriptedTransport::new().always("/translate", MockReply::json(200, json!({"translation": "Hallo"}))));

    let translation = translator(&transport)
        .translate("Hello", "en", "de", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(translation, "Hallo");
}

#[tokio::test]
async fn test_translate_withArrayBody_shouldFailWithParseError() {
    let transport = Arc::new(ScriptedTransport::new().always("/translate", MockReply::json(200, json!(["Bonjour"]))));

    let error = translator(&transport)
        .translate("Hello", "en", "fr", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error.kind, StageErrorKind::Parse(_)));
}

#[tokio::test]
async fn test_synthesize_shouldSendJsonAndReturnRawBytes() {
    let audio = [0x52u8, 0x49, 0x46, 0x46, 0x00, 0xff];
    let transport = Arc::new(ScriptedTransport::new().always("/synthesize", MockReply::bytes(200, &audio)));

    let result = tts(&transport)
        .synthesize("Bonjour, monde!", "fr", "default", "wav", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result, audio.to_vec());

    let requests = transport.requests_to("/synthesize");
    assert_eq!(requests[0].request.url, "http://tts.test/synthesize");
    assert_eq!(
        requests[0].request.body,
        RequestBody::Json(json!({
            "text": "Bonjour, monde!",
            "language": "fr",
            "voice": "default",
            "audio_format": "wav"
        }))
    );
}

#[tokio::test]
async fn test_synthesize_withServerError_shouldCarryStatusAndBody() {
    let transport = Arc::new(ScriptedTransport::new().always("/synthesize", MockReply::status(503, "voice missing")));

    let error = tts(&transport)
        .synthesize("Bonjour", "fr", "alice", "mp3", &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.service, StageKind::Tts);
    assert_eq!(error.http_status(), Some(503));
    assert_eq!(error.details()["response"], "voice missing");
}
