/*!
 * End-to-end pipeline tests through the HTTP clients
 *
 * The orchestrator is built from configuration exactly as the binary does,
 * with the network replaced by a scripted transport.
 */

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use neuralbabel::app_config::Config;
use neuralbabel::cancel::CancelToken;
use neuralbabel::errors::{PipelineStage, StageErrorKind, StageKind};
use neuralbabel::pipeline::{HealthStatus, PipelineOrchestrator, PipelineRequest};
use neuralbabel::transport::{HttpResponse, RequestBody};

use crate::common;
use crate::common::mock_transport::{MockReply, ScriptedTransport};

fn test_config(retries: u32) -> Config {
    let mut config = Config::default();
    for stage in StageKind::ALL {
        let service = config.services.get_mut(stage);
        service.endpoint = Some(common::test_url(stage).to_string());
        service.retries = retries;
        service.backoff_factor = 0.1;
        service.timeout_secs = 2.0;
    }
    config
}

fn orchestrator(transport: &Arc<ScriptedTransport>, retries: u32) -> PipelineOrchestrator {
    common::init_logging();
    let config = test_config(retries);
    assert!(config.validate().is_ok());
    PipelineOrchestrator::from_config(&config, transport.clone())
}

fn happy_transport() -> ScriptedTransport {
    ScriptedTransport::new()
        .always("/transcribe", MockReply::json(200, json!({"text": "Hello, world!"})))
        .always("/translate", MockReply::json(200, json!({"translated_text": "Bonjour, monde!"})))
        .always("/synthesize", MockReply::bytes(200, b"AUDIO"))
}

#[tokio::test]
async fn test_pipelineOverHttp_happyPath_shouldCallEachServiceOnce() {
    let transport = Arc::new(happy_transport());
    let orchestrator = orchestrator(&transport, 3);

    let audio = orchestrator
        .translate_speech(&PipelineRequest::new(b"INPUT".to_vec(), "en", "fr"))
        .await
        .unwrap();

    assert_eq!(audio, b"AUDIO".to_vec());
    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.request.url).collect();
    assert_eq!(
        urls,
        vec![
            "http://asr.test/transcribe".to_string(),
            "http://translation.test/translate".to_string(),
            "http://tts.test/synthesize".to_string(),
        ]
    );

    let translate = &transport.requests_to("/translate")[0].request;
    assert_eq!(
        translate.body,
        RequestBody::Json(json!({
            "text": "Hello, world!",
            "options": {"source_lang": "en", "target_lang": "fr"}
        }))
    );
    assert_eq!(translate.timeout, Duration::from_secs(2));

    let synthesize = &transport.requests_to("/synthesize")[0].request;
    assert_eq!(
        synthesize.body,
        RequestBody::Json(json!({
            "text": "Bonjour, monde!",
            "language": "fr",
            "voice": "default",
            "audio_format": "wav"
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_pipelineOverHttp_asrTimeouts_shouldRetryThenAbort() {
    let transport = Arc::new(happy_transport().script("/transcribe", vec![MockReply::Timeout, MockReply::Timeout]));
    let orchestrator = orchestrator(&transport, 1);

    let error = orchestrator
        .translate_speech(&PipelineRequest::new(b"INPUT".to_vec(), "en", "fr"))
        .await
        .unwrap_err();

    assert_eq!(error.stage, PipelineStage::Asr);
    assert_eq!(
        error.source.as_ref().map(|e| e.kind.clone()),
        Some(StageErrorKind::Timeout { attempts: 2 })
    );
    assert_eq!(transport.count("/transcribe"), 2);
    assert_eq!(transport.count("/translate"), 0);
    assert_eq!(transport.count("/synthesize"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pipelineOverHttp_transientTranslationTimeout_shouldRecover() {
    let transport = Arc::new(happy_transport().script("/translate", vec![MockReply::Timeout]));
    let orchestrator = orchestrator(&transport, 3);

    let output = orchestrator
        .run(&PipelineRequest::new(b"INPUT".to_vec(), "en", "fr"), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(output.audio, b"AUDIO".to_vec());
    assert_eq!(transport.count("/translate"), 2);
    assert!(output.timings.get(StageKind::Translation).unwrap() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_pipelineOverHttp_translationServerError_shouldNotRetryOrSynthesize() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .always("/transcribe", MockReply::json(200, json!({"text": "Hello"})))
            .always("/translate", MockReply::status(500, "boom"))
            .always("/synthesize", MockReply::bytes(200, b"AUDIO")),
    );
    let orchestrator = orchestrator(&transport, 3);

    let error = orchestrator
        .translate_speech(&PipelineRequest::new(b"INPUT".to_vec(), "en", "fr"))
        .await
        .unwrap_err();

    assert_eq!(error.stage, PipelineStage::Translation);
    assert_eq!(error.http_status(), Some(500));
    assert_eq!(error.details["response"], "boom");
    assert_eq!(transport.count("/translate"), 1);
    assert_eq!(transport.count("/synthesize"), 0);
}

#[tokio::test]
async fn test_pipelineOverHttp_unsupportedPair_shouldSendNothing() {
    let transport = Arc::new(happy_transport());
    let orchestrator = orchestrator(&transport, 3);

    let error = orchestrator
        .translate_speech(&PipelineRequest::new(b"INPUT".to_vec(), "de", "hi"))
        .await
        .unwrap_err();

    assert_eq!(error.stage, PipelineStage::Request);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_healthOverHttp_oneServiceRefusing_shouldBeDegraded() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .always("asr.test/health", MockReply::status(200, "ok"))
            .always("translation.test/health", MockReply::status(200, "ok"))
            .always("tts.test/health", MockReply::Refused),
    );
    let orchestrator = orchestrator(&transport, 3);

    let snapshot = orchestrator.check_services_health().await;

    assert_eq!(
        snapshot.as_map().into_iter().collect::<Vec<_>>(),
        vec![("asr", true), ("translation", true), ("tts", false)]
    );
    assert_eq!(snapshot.overall(), HealthStatus::Degraded);
    assert_eq!(transport.count("/health"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_healthOverHttp_slowProbes_shouldOverlap() {
    let ok = || MockReply::Delayed(Duration::from_secs(1), HttpResponse::new(200, "ok"));
    let transport = Arc::new(
        ScriptedTransport::new()
            .always("asr.test/health", ok())
            .always("translation.test/health", ok())
            .always("tts.test/health", ok()),
    );
    let orchestrator = orchestrator(&transport, 3);
    let started = Instant::now();

    let snapshot = orchestrator.check_services_health().await;

    assert_eq!(snapshot.overall(), HealthStatus::Ok);
    assert!(started.elapsed() < Duration::from_secs(2));
}
