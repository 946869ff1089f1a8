/*!
 * Speech-to-speech translation pipeline.
 *
 * - `stages`: capability traits for the three hops
 * - `orchestrator`: the sequential state machine and the health fan-out
 */

pub mod orchestrator;
pub mod stages;

pub use orchestrator::{
    HealthSnapshot, HealthStatus, PipelineOrchestrator, PipelineOutput, PipelineRequest, PipelineState,
    ResponseMetadata,
};
pub use stages::{SpeechRecognizer, SpeechSynthesizer, TextTranslator};
