// Dispatcher (§6, §4.7): the single entry point behind `POST /api/query`.
// Creates the Session and its Observer, picks the mode-appropriate engine
// (`ConversationAgent` directly for simple/react, `PlannerOrchestrator` for
// orchestrator mode, `WorkflowOrchestrator` for workflow mode), enforces the
// `Tasks/…` folder precondition, and returns promptly while the run
// continues on a spawned task (§6 "execution continues in background").
//
// Follows a persist-then-kick-off shape: create the row, spawn the work,
// return immediately, generalized from "one runnable entity" to "one of
// four possible engines chosen by AgentMode".

use std::collections::HashMap;
use std::sync::Arc;

use conduit_contracts::session::{parse_workflow_continuation, AgentMode, QueryRequest};
use conduit_contracts::workflow::WorkflowStatus;
use conduit_core::agent::ConversationAgent;
use conduit_core::config::{AgentConfig, AgentConfigBuilder, ReactMode};
use conduit_core::error::CoreError;
use conduit_orchestrator::cancellation::OrchestratorContext;
use conduit_orchestrator::planner_orchestrator::{PlannerOrchestrator, PlannerOrchestratorConfig};
use conduit_orchestrator::workflow_orchestrator::{
    WorkflowAction, WorkflowOrchestrator, WorkflowOrchestratorConfig, WorkflowOutcome,
};
use conduit_storage::{CreateEventRow, CreateSessionRow, CreateWorkflowRow};
use conduit_tools::virtual_tools::WorkspaceTools;
use conduit_tools::registry::RegistryExecutor;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Registry of in-flight orchestrator contexts, keyed by session, so
/// `POST /api/session/stop` can cancel a run whose HTTP request has long
/// since returned (§5 "decoupled from the HTTP request").
#[derive(Default)]
pub struct ActiveSessions {
    contexts: RwLock<HashMap<Uuid, OrchestratorContext>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, session_id: Uuid, ctx: OrchestratorContext) {
        self.contexts.write().await.insert(session_id, ctx);
    }

    async fn remove(&self, session_id: Uuid) {
        self.contexts.write().await.remove(&session_id);
    }

    pub async fn cancel(&self, session_id: Uuid) -> bool {
        if let Some(ctx) = self.contexts.read().await.get(&session_id) {
            ctx.cancel();
            true
        } else {
            false
        }
    }
}

pub struct Dispatcher {
    state: AppState,
    active: Arc<ActiveSessions>,
}

impl Dispatcher {
    pub fn new(state: AppState, active: Arc<ActiveSessions>) -> Self {
        Self { state, active }
    }

    /// Handles `POST /api/query`: validates, persists the session, creates
    /// its observer, and spawns the run. Returns as soon as those three
    /// steps complete (§6 "returns promptly after creating the
    /// session/observer").
    pub async fn dispatch(&self, request: QueryRequest) -> ApiResult<(Uuid, Uuid)> {
        if request.agent_mode.requires_tasks_folder() {
            let has_tasks_folder = request
                .file_context
                .iter()
                .any(|entry| entry.path.starts_with("Tasks/") || entry.path == "Tasks");
            if !has_tasks_folder {
                return Err(ApiError::BadRequest(
                    "orchestrator/workflow modes require a Tasks/… folder in file_context".into(),
                ));
            }
        }

        let continuation = parse_workflow_continuation(&request.query);

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                let row = self
                    .state
                    .db
                    .create_session(CreateSessionRow {
                        session_id: Uuid::now_v7(),
                        title: truncate_title(&request.query),
                        agent_mode: request.agent_mode.to_string(),
                        preset_query_id: request.preset_query_id,
                    })
                    .await?;
                row.session_id
            }
        };

        let observer = self.state.observers.create(session_id).await;
        let ctx = OrchestratorContext::new();
        self.active.register(session_id, ctx.clone()).await;

        let trace_id = Uuid::now_v7();
        let query_text = request.query.clone();
        let agent_mode = request.agent_mode;
        let state = self.state.clone();
        let active = self.active.clone();

        tokio::spawn(async move {
            let outcome = run_session(
                state.clone(),
                session_id,
                trace_id,
                agent_mode,
                query_text,
                continuation.map(str::to_string),
                ctx,
            )
            .await;

            let status = match outcome {
                Ok(()) => "completed",
                Err(ref err) => {
                    tracing::error!(session_id = %session_id, error = %err, "session run failed");
                    "error"
                }
            };
            let _ = state.db.complete_session(session_id, status).await;
            state.observers.close(session_id).await;
            active.remove(session_id).await;
        });

        Ok((session_id, observer.id()))
    }
}

fn truncate_title(query: &str) -> String {
    const MAX_LEN: usize = 120;
    if query.len() <= MAX_LEN {
        query.to_string()
    } else {
        format!("{}…", &query[..MAX_LEN])
    }
}

async fn run_session(
    state: AppState,
    session_id: Uuid,
    trace_id: Uuid,
    agent_mode: AgentMode,
    query: String,
    continuation: Option<String>,
    ctx: OrchestratorContext,
) -> Result<(), CoreError> {
    let tool_executor = Arc::new(
        RegistryExecutor::new(state.registry.clone()).with_large_output(state.large_output.clone()),
    );

    match agent_mode {
        AgentMode::Simple | AgentMode::React => {
            let config = simple_agent_config(agent_mode);
            let mut agent = ConversationAgent::new(
                config,
                session_id,
                trace_id,
                state.call_model.clone(),
                tool_executor,
                Arc::new(state.event_bus.clone()),
            );
            agent.invoke(query).await?;
            Ok(())
        }
        AgentMode::Orchestrator => {
            let config = PlannerOrchestratorConfig {
                planner_config: sub_agent_config(&state, "planner"),
                executor_config: sub_agent_config(&state, "executor"),
                validator_config: sub_agent_config(&state, "validator"),
                max_iterations: 5,
            };
            let mut orchestrator = PlannerOrchestrator::new(
                session_id,
                trace_id,
                config,
                state.call_model.clone(),
                tool_executor,
                Arc::new(state.event_bus.clone()),
            );
            orchestrator
                .run(query, &ctx)
                .await
                .map_err(CoreError::from)?;
            Ok(())
        }
        AgentMode::Workflow => {
            run_workflow_session(state, session_id, trace_id, query, continuation, ctx, tool_executor).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_workflow_session(
    state: AppState,
    session_id: Uuid,
    trace_id: Uuid,
    query: String,
    continuation: Option<String>,
    ctx: OrchestratorContext,
    tool_executor: Arc<RegistryExecutor>,
) -> Result<(), CoreError> {
    let existing = state.db.get_workflow_by_session(session_id).await?;

    let (workflow_id, objective, status) = match existing {
        Some(row) => (
            row.workflow_id,
            row.objective,
            row.workflow_status.parse::<WorkflowStatus>().map_err(CoreError::BadInput)?,
        ),
        None => {
            let row = state
                .db
                .create_workflow(CreateWorkflowRow {
                    workflow_id: Uuid::now_v7(),
                    session_id,
                    preset_query_id: None,
                    objective: query.clone(),
                    todo_file_path: "todo.md".to_string(),
                })
                .await?;
            (row.workflow_id, row.objective, WorkflowStatus::PreVerification)
        }
    };

    // The continuation marker carries only an opaque request id (§6
    // `__WORKFLOW_CONTINUE__ {request_id}`) — it signals "resume this
    // workflow", not an action. What happens next is decided entirely by
    // the persisted `WorkflowStatus` read above; the UI buttons
    // (`workflow_routes.rs`'s `update_workflow`) already wrote that status
    // before this query ever arrived.
    if let Some(request_id) = &continuation {
        tracing::debug!(session_id = %session_id, request_id, "resuming workflow via continuation marker");
    }
    let action: Option<WorkflowAction> = None;

    let workspace = Arc::new(WorkspaceTools::new(state.workspace_root.join(session_id.to_string())));
    let config = WorkflowOrchestratorConfig {
        todo_planner_config: sub_agent_config(&state, "todo_planner"),
        executor_config: sub_agent_config(&state, "executor"),
        validator_config: sub_agent_config(&state, "validator"),
        refiner_config: sub_agent_config(&state, "refiner"),
    };

    let mut orchestrator = WorkflowOrchestrator::new(
        session_id,
        trace_id,
        config,
        state.call_model.clone(),
        tool_executor,
        Arc::new(state.event_bus.clone()),
        workspace,
    );

    let (new_status, _outcome) = orchestrator
        .run(&objective, status, action, &ctx)
        .await
        .map_err(CoreError::from)?;

    state
        .db
        .update_workflow_status(workflow_id, &new_status.to_string())
        .await?;

    Ok(())
}

fn simple_agent_config(agent_mode: AgentMode) -> AgentConfig {
    let mode = match agent_mode {
        AgentMode::React => ReactMode::React,
        _ => ReactMode::Simple,
    };
    AgentConfigBuilder::new("gpt-4o")
        .mode(mode)
        .agent_mode(agent_mode)
        .build()
}

fn sub_agent_config(state: &AppState, role: &str) -> AgentConfig {
    let default_model = state
        .default_chain
        .entries
        .first()
        .map(|e| e.model.clone())
        .unwrap_or_else(|| "gpt-4o".to_string());
    AgentConfigBuilder::new(default_model)
        .system_prompt(format!("You are the {role} sub-agent."))
        .build()
}
