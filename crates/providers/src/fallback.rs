//! Failover across OpenAI-compatible endpoints.
//!
//! Only failures where the endpoint itself is at fault (network, timeout,
//! throttling, 5xx, credentials) move a request down the chain. Anything
//! that comes back as a completion is returned as-is, even when it is not
//! the JSON the request asked for: the pipeline's retry loop parses it and
//! spends an attempt, and a second endpoint would only hide the bad batch.
//! A 4xx rejection of the request stops the chain too.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wayfarer_core::Provider;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{ProviderRequest, ProviderResponse};

/// Ordered endpoints, tried until one produces a completion.
pub struct FallbackProvider {
    name: String,
    chain: Vec<Endpoint>,
}

struct Endpoint {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    /// Model to ask this endpoint for instead of the request's own.
    model: Option<String>,
}

impl Endpoint {
    fn request(&self, request: &ProviderRequest) -> ProviderRequest {
        let mut request = request.clone();
        if let Some(model) = &self.model {
            request.model = model.clone();
        }
        request
    }
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append an endpoint. `model` replaces the request's model for this
    /// endpoint only; `None` keeps whatever the pipeline asked for.
    pub fn push(
        mut self,
        provider: Arc<dyn Provider>,
        timeout: Duration,
        model: Option<String>,
    ) -> Self {
        self.chain.push(Endpoint {
            provider,
            timeout,
            model,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Endpoint names with their model override, in order.
    pub fn endpoints(&self) -> Vec<(&str, Option<&str>)> {
        self.chain
            .iter()
            .map(|e| (e.provider.name(), e.model.as_deref()))
            .collect()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let last = self.chain.len().saturating_sub(1);

        for (i, endpoint) in self.chain.iter().enumerate() {
            let name = endpoint.provider.name();
            let outcome = tokio::time::timeout(
                endpoint.timeout,
                endpoint.provider.complete(endpoint.request(&request)),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout(format!(
                    "{name} gave no answer within {}s",
                    endpoint.timeout.as_secs()
                )))
            });

            match outcome {
                Ok(response) => {
                    if i > 0 {
                        info!(provider = name, skipped = i, model = %response.model, "Served by fallback endpoint");
                    }
                    return Ok(response);
                }
                Err(e) if i < last && e.warrants_failover() => {
                    warn!(provider = name, error = %e, "Endpoint failed, trying the next one");
                }
                Err(e) => {
                    if !e.warrants_failover() {
                        warn!(provider = name, error = %e, "Request rejected; not failing over");
                    }
                    return Err(e);
                }
            }
        }

        Err(ProviderError::NotConfigured(format!(
            "'{}' has no endpoints",
            self.name
        )))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        for endpoint in &self.chain {
            if let Ok(true) = endpoint.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
