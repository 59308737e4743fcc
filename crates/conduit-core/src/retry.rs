// LLM fallback/retry chain (§5 "LLM call runs under a separate per-provider
// timeout with a fallback chain", §7 "LLMTransient retries up to N attempts
// across the configured fallback chain", §9 open question: fallback chain
// order is configuration, not a fixed policy).

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff with jitter, applied between attempts of the same
/// model before the loop advances to the next entry in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,
    pub backoff_coefficient: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            backoff_coefficient: 2.0,
            jitter: 0.1,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            backoff_coefficient: 1.0,
            jitter: 0.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before a given attempt (1-based; attempt 1 is the first try, no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let retry_num = attempt - 1;
        let base = self.initial_interval.as_secs_f64()
            * self.backoff_coefficient.powi(retry_num as i32 - 1);
        let capped = base.min(self.max_interval.as_secs_f64());
        let jittered = if self.jitter > 0.0 {
            let mut rng = rand::thread_rng();
            let range = capped * self.jitter;
            (capped + rng.gen_range(-range..range)).max(0.0)
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }

    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}

/// One entry in an LLM fallback chain: same-provider retries are modeled as
/// consecutive entries naming the same `provider`, so ordering (same-provider
/// first vs. cross-provider first) stays pure configuration, per §9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackEntry {
    pub provider: String,
    pub model: String,
}

/// The configured chain plus its retry policy. `ConversationAgent` walks
/// this in order on `LlmTransient`, exhausting `retry` attempts per entry
/// before advancing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackChain {
    pub entries: Vec<FallbackEntry>,
    pub retry: RetryPolicy,
}

impl FallbackChain {
    pub fn single(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            entries: vec![FallbackEntry {
                provider: provider.into(),
                model: model.into(),
            }],
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_entry(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.entries.push(FallbackEntry {
            provider: provider.into(),
            model: model.into(),
        });
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_grows_and_caps() {
        let policy = RetryPolicy::exponential().with_jitter(0.0);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn fallback_chain_preserves_configured_order() {
        let chain = FallbackChain::single("openai", "gpt-4o")
            .with_entry("openai", "gpt-4o-mini")
            .with_entry("anthropic", "claude-3-5-sonnet");
        assert_eq!(chain.entries.len(), 3);
        assert_eq!(chain.entries[0].provider, "openai");
        assert_eq!(chain.entries[2].provider, "anthropic");
    }
}
