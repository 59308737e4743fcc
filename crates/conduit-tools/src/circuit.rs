// ProviderBreaker (§4.3 supplemented feature) — an in-process circuit
// breaker marking a tool provider "degraded" after repeated discovery
// failures, so `DiscoveryCache` can stop retrying a provider that's clearly
// down instead of paying a connect-timeout on every call.
//
// Single-process state machine (closed → open → half-open → closed); no
// shared store across processes, since this engine runs one process per
// session.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

/// One breaker tracks every provider by name; `DiscoveryCache` consults it
/// before attempting discovery and reports the outcome afterward.
pub struct ProviderBreaker {
    config: CircuitBreakerConfig,
    providers: RwLock<HashMap<String, ProviderState>>,
}

impl ProviderBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a discovery attempt against `provider` should proceed.
    /// Transitions Open → HalfOpen once `reset_timeout` has elapsed.
    pub async fn allow(&self, provider: &str) -> bool {
        let mut providers = self.providers.write().await;
        let entry = providers.entry(provider.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|opened| Utc::now().signed_duration_since(opened))
                    .and_then(|d| d.to_std().ok())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    entry.state = CircuitState::HalfOpen;
                    entry.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self, provider: &str) {
        let mut providers = self.providers.write().await;
        let entry = providers.entry(provider.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => {
                entry.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                entry.success_count += 1;
                if entry.success_count >= self.config.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.failure_count = 0;
                    entry.success_count = 0;
                    entry.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self, provider: &str) {
        let mut providers = self.providers.write().await;
        let entry = providers.entry(provider.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => {
                entry.failure_count += 1;
                if entry.failure_count >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Utc::now());
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Utc::now());
                entry.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self, provider: &str) -> CircuitState {
        self.providers
            .read()
            .await
            .get(provider)
            .map(|s| s.state)
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = ProviderBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });
        for _ in 0..3 {
            breaker.record_failure("flaky").await;
        }
        assert_eq!(breaker.state("flaky").await, CircuitState::Open);
        assert!(!breaker.allow("flaky").await);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = ProviderBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(0),
            ..Default::default()
        });
        breaker.record_failure("p").await;
        assert!(breaker.allow("p").await);
        assert_eq!(breaker.state("p").await, CircuitState::HalfOpen);
        breaker.record_failure("p").await;
        assert_eq!(breaker.state("p").await, CircuitState::Open);
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let breaker = ProviderBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(0),
        });
        breaker.record_failure("p").await;
        breaker.allow("p").await;
        breaker.record_success("p").await;
        breaker.record_success("p").await;
        assert_eq!(breaker.state("p").await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn unknown_provider_starts_closed() {
        let breaker = ProviderBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(breaker.state("new").await, CircuitState::Closed);
        assert!(breaker.allow("new").await);
    }
}
