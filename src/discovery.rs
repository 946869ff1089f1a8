/*!
 * Endpoint resolution and health probing for downstream services.
 *
 * An explicit override address (set for local development and tests) always
 * wins. Otherwise the address is derived from the service name and namespace
 * using the cluster DNS convention and cached by name.
 */

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::StageKind;
use crate::transport::{HttpRequest, Transport};

/// Timeout applied to `/health` probes regardless of the endpoint timeout
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default DNS suffix for cluster-internal services
pub const DEFAULT_CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// Immutable description of one downstream service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEndpoint {
    /// Stage this endpoint serves
    pub service: StageKind,
    /// Logical service name
    pub name: String,
    /// Namespace the service lives in
    pub namespace: String,
    /// Explicit address that bypasses discovery
    pub override_address: Option<String>,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first attempt on timeout
    pub max_retries: u32,
    /// Base delay of the exponential backoff
    pub backoff_base: Duration,
}

impl ServiceEndpoint {
    /// Create an endpoint with default resilience settings (30s timeout, 3 retries, 0.5s backoff)
    pub fn new(service: StageKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            namespace: namespace.into(),
            override_address: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }

    pub fn with_override(mut self, address: impl Into<String>) -> Self {
        self.override_address = Some(address.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }
}

/// Maps service identities to base URLs and probes their health
#[derive(Debug)]
pub struct EndpointResolver {
    cluster_domain: String,
    transport: Arc<dyn Transport>,
    addresses: RwLock<HashMap<String, String>>,
    health: RwLock<HashMap<String, bool>>,
}

impl EndpointResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_cluster_domain(transport, DEFAULT_CLUSTER_DOMAIN)
    }

    pub fn with_cluster_domain(transport: Arc<dyn Transport>, cluster_domain: impl Into<String>) -> Self {
        Self {
            cluster_domain: cluster_domain.into(),
            transport,
            addresses: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    pub fn cluster_domain(&self) -> &str {
        &self.cluster_domain
    }

    /// Base URL for an endpoint
    ///
    /// The override address is returned verbatim before the cache is consulted.
    /// Discovered addresses are cached by service name; concurrent first calls
    /// compute the same value, so a racing insert is harmless.
    pub fn resolve(&self, endpoint: &ServiceEndpoint) -> String {
        if let Some(address) = endpoint.override_address.as_deref().filter(|a| !a.is_empty()) {
            return address.to_string();
        }

        if let Some(address) = self.addresses.read().get(&endpoint.name) {
            return address.clone();
        }

        let address = format!("http://{}.{}.{}", endpoint.name, endpoint.namespace, self.cluster_domain);
        self.addresses
            .write()
            .entry(endpoint.name.clone())
            .or_insert_with(|| address.clone());

        info!(
            "Discovered service URL: service={} url={}",
            endpoint.name, address
        );
        address
    }

    /// Probe `GET {address}/health`; never fails, any error means unhealthy
    pub async fn check_health(&self, endpoint: &ServiceEndpoint) -> bool {
        let base = self.resolve(endpoint);
        let url = format!("{}/health", base.trim_end_matches('/'));

        let healthy = match self.transport.send(HttpRequest::get(&url, HEALTH_PROBE_TIMEOUT)).await {
            Ok(response) => {
                let healthy = response.status == 200;
                debug!(
                    "Service health check: service={} url={} status_code={} healthy={}",
                    endpoint.name, url, response.status, healthy
                );
                healthy
            }
            Err(e) => {
                warn!(
                    "Service health check failed: service={} url={} error={}",
                    endpoint.name, url, e
                );
                false
            }
        };

        self.health.write().insert(endpoint.name.clone(), healthy);
        healthy
    }

    /// Result of the most recent probe for a service name, if any
    pub fn last_health(&self, name: &str) -> Option<bool> {
        self.health.read().get(name).copied()
    }

    /// Number of discovered addresses currently cached
    pub fn cached_addresses(&self) -> usize {
        self.addresses.read().len()
    }
}
