// Virtual Tools (§4.4) — the in-process tool handlers the engine always
// provides, regardless of what any external provider offers: prompt/resource
// access, workspace file I/O, and large-output handle resolution. All file
// I/O in the system is routed through these so the turn loop itself never
// touches the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use conduit_contracts::{ToolClass, ToolDefinition};

use crate::discovery::{is_metadata_only, DiscoveryCache};
use crate::error::{Result, ToolsError};
use crate::provider_client::ToolProviderClient;
use crate::registry::ToolHandler;

fn virtual_definition(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
        class: ToolClass::Virtual,
        provider_name: None,
    }
}

fn arg_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolsError::ExecutionFailed(format!("missing or non-string argument '{key}'")))
}

/// `get_prompt(server, name)` — server-first, falling back to the
/// discovery cache only when the cached content is not metadata-only.
pub struct GetPromptTool {
    pub clients: Vec<Box<dyn ToolProviderClient>>,
    pub cache: Arc<DiscoveryCache>,
}

#[async_trait::async_trait]
impl ToolHandler for GetPromptTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "get_prompt",
            "Fetch a named prompt from a tool provider, live if possible.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "server": {"type": "string"},
                    "name": {"type": "string"}
                },
                "required": ["server", "name"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let server = arg_str(arguments, "server")?;
        let name = arg_str(arguments, "name")?;

        if let Some(client) = self.clients.iter().find(|c| c.provider_name() == server) {
            match client.get_prompt(name).await {
                Ok(content) => return Ok(content),
                Err(err) => {
                    tracing::warn!(provider = %server, prompt = %name, error = %err, "live get_prompt failed; falling back to cache");
                }
            }
        }

        match self.cache.get_cached_prompt(server, name).await {
            Some(content) if !is_metadata_only(&content) => Ok(content),
            _ => Err(ToolsError::ExecutionFailed(format!(
                "prompt '{name}' unavailable from '{server}' (no live result, no usable cache entry)"
            ))),
        }
    }
}

/// `get_resource(server, name)` — analogous to `get_prompt` (§4.4).
pub struct GetResourceTool {
    pub clients: Vec<Box<dyn ToolProviderClient>>,
}

#[async_trait::async_trait]
impl ToolHandler for GetResourceTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "get_resource",
            "Fetch a named resource from a tool provider.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "server": {"type": "string"},
                    "name": {"type": "string"}
                },
                "required": ["server", "name"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let server = arg_str(arguments, "server")?;
        let name = arg_str(arguments, "name")?;

        let client = self
            .clients
            .iter()
            .find(|c| c.provider_name() == server)
            .ok_or_else(|| ToolsError::ProviderUnavailable(server.to_string()))?;

        client.get_resource(name).await
    }
}

fn resolve_within_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = root.join(relative);
    let normalized = path_clean(&candidate);
    if !normalized.starts_with(root) {
        return Err(ToolsError::ExecutionFailed(format!(
            "path '{relative}' escapes the workspace root"
        )));
    }
    Ok(normalized)
}

/// Lexical `..`/`.` resolution without requiring the path to exist (unlike
/// `Path::canonicalize`, which would fail on a not-yet-created write target).
fn path_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Workspace file tools (§4.4): enumerate/read/append/patch/overwrite under
/// a configured root. Every variant is exposed as its own tool name so the
/// model can't confuse read-only and mutating operations.
pub struct WorkspaceTools {
    pub root: PathBuf,
}

impl WorkspaceTools {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Direct write helper for callers that aren't routing through the LLM
    /// tool-call interface — the workflow orchestrator saving `todo.md`
    /// still goes through `WorkspaceTools` rather than touching the
    /// filesystem itself (§4.4 "orchestration code itself must not touch
    /// the filesystem directly").
    pub async fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = resolve_within_root(&self.root, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn read_file(&self, relative: &str) -> Result<String> {
        let path = resolve_within_root(&self.root, relative)?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    pub fn into_handlers(self: Arc<Self>) -> Vec<Arc<dyn ToolHandler>> {
        vec![
            Arc::new(WorkspaceListTool { tools: self.clone() }),
            Arc::new(WorkspaceReadTool { tools: self.clone() }),
            Arc::new(WorkspaceAppendTool { tools: self.clone() }),
            Arc::new(WorkspacePatchTool { tools: self.clone() }),
            Arc::new(WorkspaceOverwriteTool { tools: self }),
        ]
    }
}

pub struct WorkspaceListTool {
    tools: Arc<WorkspaceTools>,
}

#[async_trait::async_trait]
impl ToolHandler for WorkspaceListTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "workspace_list_files",
            "List files under the workspace root, optionally within a subdirectory.",
            serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let relative = arguments.get("path").and_then(Value::as_str).unwrap_or(".");
        let dir = resolve_within_root(&self.tools.root, relative)?;
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(name);
        }
        entries.sort();
        Ok(serde_json::to_string(&entries)?)
    }
}

pub struct WorkspaceReadTool {
    tools: Arc<WorkspaceTools>,
}

#[async_trait::async_trait]
impl ToolHandler for WorkspaceReadTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "workspace_read_file",
            "Read a file's full contents under the workspace root.",
            serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let relative = arg_str(arguments, "path")?;
        let path = resolve_within_root(&self.tools.root, relative)?;
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

pub struct WorkspaceAppendTool {
    tools: Arc<WorkspaceTools>,
}

#[async_trait::async_trait]
impl ToolHandler for WorkspaceAppendTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "workspace_append_file",
            "Append content to a file under the workspace root, creating it if absent.",
            serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["path", "content"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        use tokio::io::AsyncWriteExt;

        let relative = arg_str(arguments, "path")?;
        let content = arg_str(arguments, "content")?;
        let path = resolve_within_root(&self.tools.root, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        Ok(format!("appended {} bytes to {relative}", content.len()))
    }
}

pub struct WorkspacePatchTool {
    tools: Arc<WorkspaceTools>,
}

#[async_trait::async_trait]
impl ToolHandler for WorkspacePatchTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "workspace_patch_file",
            "Replace the first occurrence of `find` with `replace` in a file under the workspace root.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "find": {"type": "string"},
                    "replace": {"type": "string"}
                },
                "required": ["path", "find", "replace"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let relative = arg_str(arguments, "path")?;
        let find = arg_str(arguments, "find")?;
        let replace = arg_str(arguments, "replace")?;
        let path = resolve_within_root(&self.tools.root, relative)?;

        let original = tokio::fs::read_to_string(&path).await?;
        let Some(pos) = original.find(find) else {
            return Err(ToolsError::ExecutionFailed(format!(
                "patch target not found in {relative}"
            )));
        };
        let patched = format!("{}{}{}", &original[..pos], replace, &original[pos + find.len()..]);
        tokio::fs::write(&path, patched).await?;
        Ok(format!("patched {relative}"))
    }
}

pub struct WorkspaceOverwriteTool {
    tools: Arc<WorkspaceTools>,
}

#[async_trait::async_trait]
impl ToolHandler for WorkspaceOverwriteTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "workspace_overwrite_file",
            "Overwrite a file's full contents under the workspace root, creating it if absent.",
            serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["path", "content"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let relative = arg_str(arguments, "path")?;
        let content = arg_str(arguments, "content")?;
        let path = resolve_within_root(&self.tools.root, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(format!("wrote {} bytes to {relative}", content.len()))
    }
}

/// Default large-output substitution threshold (§4.4 "e.g., 32 KiB").
pub const DEFAULT_LARGE_OUTPUT_THRESHOLD_BYTES: usize = 32 * 1024;
const PREVIEW_LEN: usize = 512;

/// Content-addressed store for oversized tool outputs. The dispatcher calls
/// `substitute_if_large` right after a tool returns; the model sees
/// `{handle, size, preview}` instead of the full payload and retrieves it
/// later via `LargeOutputFetchTool`.
pub struct LargeOutputStore {
    dir: PathBuf,
    threshold: usize,
}

impl LargeOutputStore {
    pub fn new(dir: impl Into<PathBuf>, threshold: usize) -> Self {
        Self { dir: dir.into(), threshold }
    }

    pub fn with_default_threshold(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_LARGE_OUTPUT_THRESHOLD_BYTES)
    }

    fn handle_for(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns `Some(substitution_json)` when `content` exceeds the
    /// threshold; `None` means the caller should use `content` unmodified.
    pub async fn substitute_if_large(&self, content: &str) -> Result<Option<String>> {
        if content.len() <= self.threshold {
            return Ok(None);
        }

        let handle = Self::handle_for(content);
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&handle);
        tokio::fs::write(path, content.as_bytes()).await?;

        let preview: String = content.chars().take(PREVIEW_LEN).collect();
        let payload = serde_json::json!({
            "handle": handle,
            "size": content.len(),
            "preview": preview,
        });
        Ok(Some(payload.to_string()))
    }

    pub async fn fetch(&self, handle: &str) -> Result<String> {
        let path = self.dir.join(handle);
        Ok(tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ToolsError::ExecutionFailed(format!("no stored output for handle '{handle}'")))?)
    }
}

/// The retrieval-side virtual tool for `LargeOutputStore` handles (§4.4
/// "a separate virtual tool reads by handle on demand").
pub struct LargeOutputFetchTool {
    pub store: Arc<LargeOutputStore>,
}

#[async_trait::async_trait]
impl ToolHandler for LargeOutputFetchTool {
    fn definition(&self) -> ToolDefinition {
        virtual_definition(
            "fetch_large_output",
            "Retrieve the full content previously substituted with a handle.",
            serde_json::json!({
                "type": "object",
                "properties": {"handle": {"type": "string"}},
                "required": ["handle"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let handle = arg_str(arguments, "handle")?;
        self.store.fetch(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn workspace_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(WorkspaceTools::new(dir.path()));
        let write = WorkspaceOverwriteTool { tools: tools.clone() };
        let read = WorkspaceReadTool { tools };

        write
            .invoke(&serde_json::json!({"path": "notes/todo.md", "content": "- [ ] one"}))
            .await
            .unwrap();
        let content = read.invoke(&serde_json::json!({"path": "notes/todo.md"})).await.unwrap();
        assert_eq!(content, "- [ ] one");
    }

    #[tokio::test]
    async fn workspace_path_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(WorkspaceTools::new(dir.path()));
        let read = WorkspaceReadTool { tools };
        let err = read
            .invoke(&serde_json::json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolsError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn patch_replaces_first_occurrence_only() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(WorkspaceTools::new(dir.path()));
        let write = WorkspaceOverwriteTool { tools: tools.clone() };
        let patch = WorkspacePatchTool { tools: tools.clone() };
        let read = WorkspaceReadTool { tools };

        write
            .invoke(&serde_json::json!({"path": "f.txt", "content": "a b a"}))
            .await
            .unwrap();
        patch
            .invoke(&serde_json::json!({"path": "f.txt", "find": "a", "replace": "x"}))
            .await
            .unwrap();
        let content = read.invoke(&serde_json::json!({"path": "f.txt"})).await.unwrap();
        assert_eq!(content, "x b a");
    }

    #[tokio::test]
    async fn large_output_below_threshold_is_not_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LargeOutputStore::new(dir.path(), 1024);
        let result = store.substitute_if_large("small").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn large_output_above_threshold_is_substituted_and_fetchable() {
        let dir = tempfile::tempdir().unwrap();
        let store = LargeOutputStore::new(dir.path(), 8);
        let big = "x".repeat(100);
        let substituted = store.substitute_if_large(&big).await.unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&substituted).unwrap();
        let handle = parsed["handle"].as_str().unwrap();
        assert_eq!(parsed["size"].as_u64().unwrap(), 100);

        let fetched = store.fetch(handle).await.unwrap();
        assert_eq!(fetched, big);
    }
}
