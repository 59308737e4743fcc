// Provider DTOs (§3 "Provider", §4.3 "Discovery")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the core talks to an external tool provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Stdio,
    Sse,
    Http,
}

/// Declarative config for one provider entry, as loaded from the config
/// file and expanded for `${VAR}` placeholders (§6 ConfigModel).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderConfig {
    pub name: String,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Live health of a provider as tracked by the circuit breaker (§4.3, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Healthy,
    Degraded,
    Unavailable,
}

/// Snapshot of a provider's discovery cache entry, surfaced over the tools
/// admin routes (§6).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscoveryCacheEntry {
    pub provider_name: String,
    pub status: ProviderStatus,
    pub tool_count: usize,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_defaults_enabled_true() {
        let json = serde_json::json!({
            "name": "filesystem",
            "transport": "stdio",
            "command": "mcp-fs",
        });
        let cfg: ProviderConfig = serde_json::from_value(json).unwrap();
        assert!(cfg.enabled);
        assert!(cfg.args.is_empty());
    }
}
