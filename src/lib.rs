/*!
 * # neuralbabel - speech-to-speech translation orchestrator
 *
 * Turns speech in one language into speech in another by chaining three
 * independently deployed HTTP services: speech recognition (ASR), text
 * translation and speech synthesis (TTS).
 *
 * ## Features
 *
 * - Service discovery from `<name>.<namespace>.<cluster domain>` with
 *   explicit endpoint overrides
 * - Per-service timeouts with exponential backoff retries on timeouts
 * - Stage-attributed errors: every failure says which hop broke
 * - Concurrent health probing of all services
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `discovery`: Endpoint resolution and health probes
 * - `transport`: HTTP transport abstraction over reqwest
 * - `clients`: Retrying stage client and the three service clients:
 *   - `clients::asr`: Speech recognition client
 *   - `clients::translation`: Text translation client
 *   - `clients::tts`: Speech synthesis client
 * - `pipeline`: Orchestrator state machine and stage traits
 * - `cancel`: Cooperative cancellation token
 * - `metrics`: In-process counters and stage timings
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod cancel;
pub mod clients;
pub mod discovery;
pub mod errors;
pub mod language_utils;
pub mod metrics;
pub mod pipeline;
pub mod transport;

// Re-export main types for easier usage
pub use app_config::Config;
pub use cancel::CancelToken;
pub use clients::{AsrClient, StageClient, TranslationClient, TtsClient};
pub use discovery::{EndpointResolver, ServiceEndpoint};
pub use errors::{AppError, PipelineError, PipelineStage, StageError, StageErrorKind, StageKind};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t, LanguagePair};
pub use pipeline::{HealthSnapshot, PipelineOrchestrator, PipelineRequest};
pub use transport::{ReqwestTransport, Transport};
