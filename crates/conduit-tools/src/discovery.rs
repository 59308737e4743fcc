// DiscoveryCache & Tool Discovery (§4.3)
//
// Keyed by `unified_{provider_name}`, TTL default 30 minutes, write-through
// to an on-disk JSON mirror so a restart doesn't re-discover everything.
// At most one discovery per provider is in flight at a time; concurrent
// callers for the same provider await the same future rather than each
// issuing their own `ListTools`/`ListPrompts`/`ListResources` round trip.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, RwLock};

use conduit_contracts::ToolDefinition;

use crate::error::{Result, ToolsError};
use crate::provider_client::{
    PromptInventoryEntry, ProviderInventory, ResourceInventoryEntry, ToolProviderClient,
};

const METADATA_ONLY_PLACEHOLDER_PREFIX: &str = "Prompt loaded from";
/// Below this length a cached prompt is treated as metadata-only and must
/// not be served as if it were full content (§4.4 `get_prompt` fallback).
const METADATA_ONLY_MIN_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPrompt {
    pub name: String,
    pub description: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResource {
    pub name: String,
    pub uri: String,
    pub description: String,
}

/// On-disk / in-memory unit: one provider's inventory plus cache metadata
/// (§3 "DiscoveryCacheEntry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryCacheEntry {
    pub provider_name: String,
    pub tools: Vec<ToolDefinition>,
    pub prompts: Vec<CachedPrompt>,
    pub resources: Vec<CachedResource>,
    pub discovered_at: DateTime<Utc>,
    pub ttl_minutes: i64,
    pub last_accessed: DateTime<Utc>,
}

impl DiscoveryCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.discovered_at) > chrono::Duration::minutes(self.ttl_minutes)
    }

    fn cache_key(provider_name: &str) -> String {
        format!("unified_{provider_name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCacheOutcome {
    Hit,
    Miss,
    Error,
}

impl ProviderCacheOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderCacheOutcome::Hit => "hit",
            ProviderCacheOutcome::Miss => "miss",
            ProviderCacheOutcome::Error => "error",
        }
    }
}

pub struct ProviderDiscoveryResult {
    pub provider_name: String,
    pub outcome: ProviderCacheOutcome,
    pub tool_count: usize,
    pub error: Option<String>,
}

/// Result of `get_cached_or_fresh` across a set of providers — one
/// `comprehensive_cache` event's worth of data, not one event per provider
/// (§4.3 cache contract).
pub struct DiscoverySummary {
    pub tools: Vec<ToolDefinition>,
    pub prompts_by_provider: HashMap<String, Vec<CachedPrompt>>,
    pub resources_by_provider: HashMap<String, Vec<CachedResource>>,
    pub tool_to_provider: HashMap<String, String>,
    pub server_status: Vec<ProviderDiscoveryResult>,
}

pub struct DiscoveryCache {
    cache_dir: PathBuf,
    default_ttl_minutes: std::sync::atomic::AtomicI64,
    memory: RwLock<HashMap<String, DiscoveryCacheEntry>>,
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
}

impl DiscoveryCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            default_ttl_minutes: std::sync::atomic::AtomicI64::new(30),
            memory: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Runtime TTL setter (§4.3 "TTL default 30 minutes; runtime setter exists").
    pub fn set_default_ttl(&self, ttl: Duration) {
        self.default_ttl_minutes
            .store(ttl.as_secs() as i64 / 60, std::sync::atomic::Ordering::Relaxed);
    }

    fn default_ttl(&self) -> i64 {
        self.default_ttl_minutes.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn disk_path(&self, provider_name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", DiscoveryCacheEntry::cache_key(provider_name)))
    }

    /// Read-through on startup / first access: memory miss falls back to
    /// the on-disk mirror before declaring a true miss.
    async fn read_through(&self, provider_name: &str) -> Option<DiscoveryCacheEntry> {
        if let Some(entry) = self.memory.read().await.get(provider_name).cloned() {
            return Some(entry);
        }
        let path = self.disk_path(provider_name);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let entry: DiscoveryCacheEntry = serde_json::from_slice(&bytes).ok()?;
        self.memory
            .write()
            .await
            .insert(provider_name.to_string(), entry.clone());
        Some(entry)
    }

    async fn write_through(&self, entry: &DiscoveryCacheEntry) -> Result<()> {
        self.memory
            .write()
            .await
            .insert(entry.provider_name.clone(), entry.clone());
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.disk_path(&entry.provider_name);
        let bytes = serde_json::to_vec_pretty(entry)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// One provider's discovery pass (§4.3 "Discovery procedure per
    /// provider"): connect, list tools/prompts/resources, fetch each
    /// prompt's full content, merge and write through.
    async fn discover_one(
        &self,
        client: &dyn ToolProviderClient,
    ) -> std::result::Result<DiscoveryCacheEntry, ToolsError> {
        let provider_name = client.provider_name().to_string();

        let tools = client.list_tools().await?;
        let resources = client
            .list_resources()
            .await
            .unwrap_or_default_with_warning(&provider_name, "list_resources");
        let prompt_meta = client
            .list_prompts()
            .await
            .unwrap_or_default_with_warning(&provider_name, "list_prompts");

        let mut prompts = Vec::with_capacity(prompt_meta.len());
        for meta in prompt_meta {
            let content = match client.get_prompt(&meta.name).await {
                Ok(full) => full,
                Err(err) => {
                    tracing::warn!(
                        provider = %provider_name,
                        prompt = %meta.name,
                        error = %err,
                        "get_prompt failed during discovery; storing metadata only"
                    );
                    format!("{METADATA_ONLY_PLACEHOLDER_PREFIX} {} (fetch failed)", meta.name)
                }
            };
            prompts.push(CachedPrompt {
                name: meta.name,
                description: meta.description,
                content,
            });
        }

        let entry = DiscoveryCacheEntry {
            provider_name: provider_name.clone(),
            tools,
            prompts,
            resources: resources
                .into_iter()
                .map(|r| CachedResource {
                    name: r.name,
                    uri: r.uri,
                    description: r.description,
                })
                .collect(),
            discovered_at: Utc::now(),
            ttl_minutes: self.default_ttl(),
            last_accessed: Utc::now(),
        };
        self.write_through(&entry).await?;
        Ok(entry)
    }

    /// §4.3 cache contract: returns a merged summary across all providers,
    /// with per-provider hit/miss/error breakdown, discovering only what's
    /// missing or expired. A provider's discovery failure degrades only
    /// that provider (§4.3 Failure semantics).
    pub async fn get_cached_or_fresh(
        &self,
        clients: &[Box<dyn ToolProviderClient>],
    ) -> DiscoverySummary {
        let mut tools = Vec::new();
        let mut prompts_by_provider = HashMap::new();
        let mut resources_by_provider = HashMap::new();
        let mut tool_to_provider = HashMap::new();
        let mut server_status = Vec::new();

        for client in clients {
            let provider_name = client.provider_name().to_string();
            let now = Utc::now();

            if let Some(mut cached) = self.read_through(&provider_name).await {
                if !cached.is_expired(now) {
                    cached.last_accessed = now;
                    let _ = self.write_through(&cached).await;
                    server_status.push(ProviderDiscoveryResult {
                        provider_name: provider_name.clone(),
                        outcome: ProviderCacheOutcome::Hit,
                        tool_count: cached.tools.len(),
                        error: None,
                    });
                    for tool in &cached.tools {
                        tool_to_provider.insert(tool.name.clone(), provider_name.clone());
                    }
                    tools.extend(cached.tools.clone());
                    prompts_by_provider.insert(provider_name.clone(), cached.prompts.clone());
                    resources_by_provider.insert(provider_name.clone(), cached.resources.clone());
                    continue;
                }
            }

            match self.discover_single_flight(provider_name.clone(), client.as_ref()).await {
                Ok(entry) => {
                    server_status.push(ProviderDiscoveryResult {
                        provider_name: provider_name.clone(),
                        outcome: ProviderCacheOutcome::Miss,
                        tool_count: entry.tools.len(),
                        error: None,
                    });
                    for tool in &entry.tools {
                        tool_to_provider.insert(tool.name.clone(), provider_name.clone());
                    }
                    tools.extend(entry.tools.clone());
                    prompts_by_provider.insert(provider_name.clone(), entry.prompts.clone());
                    resources_by_provider.insert(provider_name.clone(), entry.resources.clone());
                }
                Err(err) => {
                    tracing::warn!(provider = %provider_name, error = %err, "discovery failed; provider degraded");
                    server_status.push(ProviderDiscoveryResult {
                        provider_name,
                        outcome: ProviderCacheOutcome::Error,
                        tool_count: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        DiscoverySummary {
            tools,
            prompts_by_provider,
            resources_by_provider,
            tool_to_provider,
            server_status,
        }
    }

    /// Ensures at most one discovery is in flight per provider (§4.3 "On
    /// concurrent callers for the same provider, at most one discovery is
    /// in flight; others wait").
    async fn discover_single_flight(
        &self,
        provider_name: String,
        client: &dyn ToolProviderClient,
    ) -> std::result::Result<DiscoveryCacheEntry, ToolsError> {
        loop {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(notify) = in_flight.get(&provider_name).cloned() {
                drop(in_flight);
                notify.notified().await;
                if let Some(entry) = self.read_through(&provider_name).await {
                    if !entry.is_expired(Utc::now()) {
                        return Ok(entry);
                    }
                }
                continue;
            }
            let notify = Arc::new(Notify::new());
            in_flight.insert(provider_name.clone(), notify.clone());
            drop(in_flight);

            let result = self.discover_one(client).await;

            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(&provider_name);
            notify.notify_waiters();

            return result;
        }
    }

    /// Read-only snapshot of one provider's cache entry, used by the tools
    /// admin routes to render a `ServerDetail` without forcing a fresh
    /// discovery (§6 "on-demand detailed schema per provider; caches on
    /// first call").
    pub async fn get_entry(&self, provider_name: &str) -> Option<DiscoveryCacheEntry> {
        self.read_through(provider_name).await
    }

    pub async fn get_cached_prompt(&self, provider_name: &str, name: &str) -> Option<String> {
        let entry = self.read_through(provider_name).await?;
        let prompt = entry.prompts.into_iter().find(|p| p.name == name)?;
        if is_metadata_only(&prompt.content) {
            None
        } else {
            Some(prompt.content)
        }
    }
}

/// §4.4 `get_prompt` fallback guard: cached content is usable only if it's
/// not metadata-only (length > 100 and not the placeholder text).
pub fn is_metadata_only(content: &str) -> bool {
    content.len() <= METADATA_ONLY_MIN_LEN || content.starts_with(METADATA_ONLY_PLACEHOLDER_PREFIX)
}

trait OrDegradedDefault<T> {
    fn unwrap_or_default_with_warning(self, provider: &str, call: &str) -> Vec<T>;
}

impl<T> OrDegradedDefault<T> for std::result::Result<Vec<T>, ToolsError> {
    fn unwrap_or_default_with_warning(self, provider: &str, call: &str) -> Vec<T> {
        match self {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(provider = %provider, call = %call, error = %err, "discovery sub-call failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_contracts::ToolClass;

    struct StubClient {
        name: String,
        prompt_content: String,
        fail_get_prompt: bool,
    }

    #[async_trait]
    impl ToolProviderClient for StubClient {
        fn provider_name(&self) -> &str {
            &self.name
        }

        async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
            Ok(vec![ToolDefinition {
                name: format!("{}_tool", self.name),
                description: "a tool".into(),
                parameters: serde_json::json!({}),
                class: ToolClass::External,
                provider_name: Some(self.name.clone()),
            }])
        }

        async fn list_prompts(&self) -> Result<Vec<PromptInventoryEntry>> {
            Ok(vec![PromptInventoryEntry {
                name: "greeting".into(),
                description: "says hi".into(),
                content: None,
            }])
        }

        async fn list_resources(&self) -> Result<Vec<ResourceInventoryEntry>> {
            Ok(vec![])
        }

        async fn get_prompt(&self, _name: &str) -> Result<String> {
            if self.fail_get_prompt {
                Err(ToolsError::ExecutionFailed("boom".into()))
            } else {
                Ok(self.prompt_content.clone())
            }
        }

        async fn get_resource(&self, _name: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn invoke_tool(&self, _tool_name: &str, _arguments: &serde_json::Value) -> Result<String> {
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn discovery_stores_full_prompt_content_not_just_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        let client: Box<dyn ToolProviderClient> = Box::new(StubClient {
            name: "docs".into(),
            prompt_content: "x".repeat(150),
            fail_get_prompt: false,
        });

        let summary = cache.get_cached_or_fresh(std::slice::from_ref(&client)).await;
        assert_eq!(summary.server_status[0].outcome, ProviderCacheOutcome::Miss);
        let prompts = &summary.prompts_by_provider["docs"];
        assert!(!is_metadata_only(&prompts[0].content));
    }

    #[tokio::test]
    async fn failed_get_prompt_falls_back_to_metadata_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        let client: Box<dyn ToolProviderClient> = Box::new(StubClient {
            name: "flaky".into(),
            prompt_content: String::new(),
            fail_get_prompt: true,
        });

        let summary = cache.get_cached_or_fresh(std::slice::from_ref(&client)).await;
        let prompts = &summary.prompts_by_provider["flaky"];
        assert!(is_metadata_only(&prompts[0].content));
    }

    #[tokio::test]
    async fn cache_round_trip_through_disk_preserves_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        let client: Box<dyn ToolProviderClient> = Box::new(StubClient {
            name: "roundtrip".into(),
            prompt_content: "y".repeat(200),
            fail_get_prompt: false,
        });
        cache.get_cached_or_fresh(std::slice::from_ref(&client)).await;

        let reloaded = DiscoveryCache::new(dir.path());
        let summary = reloaded.get_cached_or_fresh(std::slice::from_ref(&client)).await;
        assert_eq!(summary.server_status[0].outcome, ProviderCacheOutcome::Hit);
    }
}
