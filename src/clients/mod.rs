/*!
 * Stage clients for the three downstream services.
 *
 * `StageClient` owns the shared resilience policy: it resolves the service
 * address once, retries timed-out requests with exponential backoff and
 * fails immediately on HTTP errors or any other transport failure.
 * The stage-specific wrappers build the wire payloads on top of it:
 * - `asr`: speech recognition (`POST /transcribe`)
 * - `translation`: text translation (`POST /translate`)
 * - `tts`: speech synthesis (`POST /synthesize`)
 */

use log::{error, info, warn};
use reqwest::Method;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::discovery::{EndpointResolver, ServiceEndpoint};
use crate::errors::{StageError, StageErrorKind, StageKind};
use crate::metrics::{ServiceMetrics, ServiceMetricsSnapshot};
use crate::transport::{HttpRequest, HttpResponse, RequestBody, Transport, TransportError};

pub mod asr;
pub mod translation;
pub mod tts;

pub use asr::AsrClient;
pub use translation::TranslationClient;
pub use tts::TtsClient;

/// Bounded exponential backoff applied to timed-out requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each subsequent one
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Total attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after the failed attempt with zero-based index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(31))
    }

    /// All delays a request that always times out would go through
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|attempt| self.delay_for(attempt)).collect()
    }
}

impl From<&ServiceEndpoint> for RetryPolicy {
    fn from(endpoint: &ServiceEndpoint) -> Self {
        Self::new(endpoint.max_retries, endpoint.backoff_base)
    }
}

/// Successful call: the response plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub response: HttpResponse,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Wall time including backoff sleeps
    pub elapsed: Duration,
}

/// Retrying invoker of one remote capability
#[derive(Debug)]
pub struct StageClient {
    endpoint: ServiceEndpoint,
    policy: RetryPolicy,
    resolver: Arc<EndpointResolver>,
    transport: Arc<dyn Transport>,
    base_url: OnceLock<String>,
    metrics: ServiceMetrics,
}

impl StageClient {
    pub fn new(endpoint: ServiceEndpoint, resolver: Arc<EndpointResolver>, transport: Arc<dyn Transport>) -> Self {
        Self {
            policy: RetryPolicy::from(&endpoint),
            metrics: ServiceMetrics::new(endpoint.service),
            endpoint,
            resolver,
            transport,
            base_url: OnceLock::new(),
        }
    }

    pub fn service(&self) -> StageKind {
        self.endpoint.service
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Base URL, resolved on first use and fixed for the client's lifetime
    pub fn base_url(&self) -> &str {
        self.base_url.get_or_init(|| self.resolver.resolve(&self.endpoint))
    }

    pub fn metrics(&self) -> ServiceMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn record_parse_error(&self) {
        self.metrics.record_error("parse");
    }

    /// Probe the service's `/health` path; never fails
    pub async fn check_health(&self) -> bool {
        self.resolver.check_health(&self.endpoint).await
    }

    /// Send a request, retrying only on timeouts
    ///
    /// Status codes >= 400 and non-timeout transport failures end the call on
    /// the first occurrence. Timeouts are retried up to `max_retries` times
    /// with delays of `backoff_base * 2^attempt`.
    pub async fn invoke(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        cancel: &CancelToken,
    ) -> Result<Invocation, StageError> {
        let service = self.service();
        let call_started = Instant::now();
        let url = format!("{}{}", self.base_url().trim_end_matches('/'), path);
        let fail = |attempts: u32, kind: StageErrorKind| StageError::new(service, path, attempts, kind);

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                self.metrics.record_error("cancelled");
                return Err(fail(attempt, StageErrorKind::Cancelled));
            }

            let request = HttpRequest {
                method: method.clone(),
                url: url.clone(),
                body: body.clone(),
                timeout: self.endpoint.timeout,
            };

            let started = Instant::now();
            let result = tokio::select! {
                result = self.transport.send(request) => result,
                _ = cancel.cancelled() => {
                    self.metrics.record_attempt(started.elapsed());
                    self.metrics.record_error("cancelled");
                    warn!(
                        "{} service request cancelled in flight: url={} attempt={}",
                        service.display_name(), url, attempt + 1
                    );
                    return Err(fail(attempt + 1, StageErrorKind::Cancelled));
                }
            };
            self.metrics.record_attempt(started.elapsed());

            match result {
                Ok(response) if response.is_success() => {
                    self.metrics.record_success();
                    return Ok(Invocation {
                        response,
                        attempts: attempt + 1,
                        elapsed: call_started.elapsed(),
                    });
                }
                Ok(response) => {
                    let body = response.text();
                    self.metrics.record_error(&format!("http_{}", response.status));
                    error!(
                        "{} service request failed: status_code={} url={} response={}",
                        service.display_name(), response.status, url, body
                    );
                    return Err(fail(attempt + 1, StageErrorKind::Http { status: response.status, body }));
                }
                Err(TransportError::Timeout(message)) => {
                    self.metrics.record_error("timeout");
                    warn!(
                        "{} service request timed out: url={} attempt={}/{} error={}",
                        service.display_name(), url, attempt + 1, self.policy.max_attempts(), message
                    );

                    if attempt >= self.policy.max_retries {
                        return Err(fail(attempt + 1, StageErrorKind::Timeout { attempts: attempt + 1 }));
                    }

                    let backoff = self.policy.delay_for(attempt);
                    if cancel.is_cancelled() {
                        self.metrics.record_error("cancelled");
                        return Err(fail(attempt + 1, StageErrorKind::Cancelled));
                    }

                    info!(
                        "Retrying {} service request: url={} retry={} backoff={:.3}s",
                        service.label(), url, attempt + 1, backoff.as_secs_f64()
                    );
                    if !cancel.sleep(backoff).await {
                        self.metrics.record_error("cancelled");
                        return Err(fail(attempt + 1, StageErrorKind::Cancelled));
                    }

                    self.metrics.record_retry();
                    attempt += 1;
                }
                Err(e) => {
                    self.metrics.record_error("transport");
                    error!(
                        "{} service request failed: url={} error={}",
                        service.display_name(), url, e
                    );
                    return Err(fail(attempt + 1, StageErrorKind::Transport(e.to_string())));
                }
            }
        }
    }
}
