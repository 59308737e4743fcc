// Preset Query DTOs (§3 "PresetQuery")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::AgentMode;

/// A saved query template an operator can launch without retyping (§6
/// preset routes).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresetQuery {
    pub preset_query_id: Uuid,
    pub name: String,
    pub query: String,
    pub agent_mode: AgentMode,
    /// Provider names the query should be restricted to; empty means "all
    /// discovered providers" (§4.11 `preset_queries` schema).
    #[serde(default)]
    pub selected_servers: Vec<String>,
    /// Seeded presets shipped with the system, as opposed to ones an
    /// operator saved themselves — surfaced separately in listings so the
    /// UI can group them.
    #[serde(default)]
    pub is_predefined: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePresetQueryRequest {
    pub name: String,
    pub query: String,
    pub agent_mode: AgentMode,
    #[serde(default)]
    pub selected_servers: Vec<String>,
}
