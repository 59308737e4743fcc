// PersistenceStore (§4.11): a `sqlx::PgPool`-backed repository struct.
// Migrations run at startup via `sqlx::migrate!`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CreateEventRow, CreatePresetQueryRow, CreateSessionRow, CreateWorkflowRow, EventRow,
    PresetQueryRow, SessionRow, WorkflowRow,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- sessions ---------------------------------------------------------

    pub async fn create_session(&self, row: CreateSessionRow) -> Result<SessionRow> {
        let preset_query_id = row.preset_query_id;
        let record = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (session_id, title, agent_mode, status, preset_query_id)
            VALUES ($1, $2, $3, 'in_progress', $4)
            RETURNING id, session_id, title, agent_mode, status, created_at, completed_at, preset_query_id
            "#,
        )
        .bind(row.session_id)
        .bind(row.title)
        .bind(row.agent_mode)
        .bind(preset_query_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRow>> {
        let record = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, session_id, title, agent_mode, status, created_at, completed_at, preset_query_id
            FROM sessions WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Sets status to a terminal value and stamps `completed_at` (§3 Session
    /// "updated on terminal event; never deleted implicitly").
    pub async fn complete_session(&self, session_id: Uuid, status: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE sessions SET status = $2, completed_at = now() WHERE session_id = $1"#,
        )
        .bind(session_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `PUT /api/chat-history/sessions/{id}` (§6) — currently only the
    /// title is user-editable; `agent_mode`/`status` change only through
    /// the run lifecycle itself.
    pub async fn update_session_title(&self, session_id: Uuid, title: &str) -> Result<Option<SessionRow>> {
        let record = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions SET title = $2 WHERE session_id = $1
            RETURNING id, session_id, title, agent_mode, status, created_at, completed_at, preset_query_id
            "#,
        )
        .bind(session_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// `DELETE /api/chat-history/sessions/{id}` (§6). Events cascade via the
    /// schema's foreign key (§4.11 `events.chat_session_id FK`).
    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_sessions(&self, limit: i64, offset: i64) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, session_id, title, agent_mode, status, created_at, completed_at, preset_query_id
            FROM sessions ORDER BY created_at DESC LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -- events -------------------------------------------------------------
    // Events are append-only: no update/delete statement exists for them
    // (§3 Event "persisted once; immutable").

    pub async fn create_event(&self, row: CreateEventRow) -> Result<EventRow> {
        let record = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (session_id, event_type, event_data)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, event_type, timestamp, event_data
            "#,
        )
        .bind(row.session_id)
        .bind(row.event_type)
        .bind(row.event_data)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Replay/search support for chat history (§6 "events replay/search").
    /// `after_id` is the client's last-observed cursor; pass 0 to fetch from
    /// the start of the session.
    pub async fn list_events(
        &self,
        session_id: Uuid,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, session_id, event_type, timestamp, event_data
            FROM events WHERE session_id = $1 AND id > $2
            ORDER BY id ASC LIMIT $3
            "#,
        )
        .bind(session_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// `GET /api/chat-history/events?…` (§6 "search"). The source spec
    /// doesn't enumerate a query grammar, so this is a filtered listing —
    /// optional session and event-type filters, newest first — rather than
    /// free-text search (recorded as an Open Question decision in
    /// DESIGN.md).
    pub async fn search_events(
        &self,
        session_id: Option<Uuid>,
        event_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, session_id, event_type, timestamp, event_data
            FROM events
            WHERE ($1::uuid IS NULL OR session_id = $1)
              AND ($2::text IS NULL OR event_type = $2)
            ORDER BY id DESC LIMIT $3
            "#,
        )
        .bind(session_id)
        .bind(event_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -- preset queries -------------------------------------------------------

    pub async fn create_preset_query(&self, row: CreatePresetQueryRow) -> Result<PresetQueryRow> {
        let record = sqlx::query_as::<_, PresetQueryRow>(
            r#"
            INSERT INTO preset_queries (preset_query_id, label, query, agent_mode, selected_servers, is_predefined)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, preset_query_id, label, query, agent_mode, selected_servers, is_predefined, created_at, updated_at
            "#,
        )
        .bind(row.preset_query_id)
        .bind(row.label)
        .bind(row.query)
        .bind(row.agent_mode)
        .bind(row.selected_servers)
        .bind(row.is_predefined)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list_preset_queries(&self) -> Result<Vec<PresetQueryRow>> {
        let rows = sqlx::query_as::<_, PresetQueryRow>(
            r#"
            SELECT id, preset_query_id, label, query, agent_mode, selected_servers, is_predefined, created_at, updated_at
            FROM preset_queries ORDER BY is_predefined DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_preset_query(&self, preset_query_id: Uuid) -> Result<Option<PresetQueryRow>> {
        let record = sqlx::query_as::<_, PresetQueryRow>(
            r#"
            SELECT id, preset_query_id, label, query, agent_mode, selected_servers, is_predefined, created_at, updated_at
            FROM preset_queries WHERE preset_query_id = $1
            "#,
        )
        .bind(preset_query_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Partial update via `COALESCE`: pass `None` for any field that should
    /// be left unchanged.
    pub async fn update_preset_query(
        &self,
        preset_query_id: Uuid,
        label: Option<String>,
        query: Option<String>,
        selected_servers: Option<serde_json::Value>,
    ) -> Result<Option<PresetQueryRow>> {
        let record = sqlx::query_as::<_, PresetQueryRow>(
            r#"
            UPDATE preset_queries
            SET label = COALESCE($2, label),
                query = COALESCE($3, query),
                selected_servers = COALESCE($4, selected_servers),
                updated_at = now()
            WHERE preset_query_id = $1
            RETURNING id, preset_query_id, label, query, agent_mode, selected_servers, is_predefined, created_at, updated_at
            "#,
        )
        .bind(preset_query_id)
        .bind(label)
        .bind(query)
        .bind(selected_servers)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn delete_preset_query(&self, preset_query_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM preset_queries WHERE preset_query_id = $1 AND is_predefined = false")
            .bind(preset_query_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- workflows ------------------------------------------------------------

    pub async fn create_workflow(&self, row: CreateWorkflowRow) -> Result<WorkflowRow> {
        let record = sqlx::query_as::<_, WorkflowRow>(
            r#"
            INSERT INTO workflows (workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path)
            VALUES ($1, $2, $3, $4, 'pre_verification', $5)
            RETURNING id, workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path, created_at, updated_at
            "#,
        )
        .bind(row.workflow_id)
        .bind(row.session_id)
        .bind(row.preset_query_id)
        .bind(row.objective)
        .bind(row.todo_file_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_workflow(&self, workflow_id: Uuid) -> Result<Option<WorkflowRow>> {
        let record = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path, created_at, updated_at
            FROM workflows WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_workflow_by_session(&self, session_id: Uuid) -> Result<Option<WorkflowRow>> {
        let record = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path, created_at, updated_at
            FROM workflows WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// The single unified workflow-update statement (§6 "single unified
    /// update endpoint, NOT separate refinement endpoint") — every UI
    /// button press (approve/regenerate/request-changes) funnels through
    /// this one status write.
    pub async fn update_workflow_status(
        &self,
        workflow_id: Uuid,
        status: &str,
    ) -> Result<Option<WorkflowRow>> {
        let record = sqlx::query_as::<_, WorkflowRow>(
            r#"
            UPDATE workflows SET workflow_status = $2, updated_at = now()
            WHERE workflow_id = $1
            RETURNING id, workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path, created_at, updated_at
            "#,
        )
        .bind(workflow_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// The objective half of the same unified endpoint (§6) — a caller
    /// editing a workflow's objective text rather than advancing its
    /// status. Kept as a separate statement rather than widening
    /// `update_workflow_status` because the two fields are never written
    /// together in one request.
    pub async fn update_objective(
        &self,
        workflow_id: Uuid,
        objective: &str,
    ) -> Result<Option<WorkflowRow>> {
        let record = sqlx::query_as::<_, WorkflowRow>(
            r#"
            UPDATE workflows SET objective = $2, updated_at = now()
            WHERE workflow_id = $1
            RETURNING id, workflow_id, session_id, preset_query_id, objective, workflow_status, todo_file_path, created_at, updated_at
            "#,
        )
        .bind(workflow_id)
        .bind(objective)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_row_stores_empty_preset_id_as_none() {
        let row = CreateSessionRow {
            session_id: Uuid::now_v7(),
            title: "t".into(),
            agent_mode: "simple".into(),
            preset_query_id: None,
        };
        assert!(row.preset_query_id.is_none());
    }
}
