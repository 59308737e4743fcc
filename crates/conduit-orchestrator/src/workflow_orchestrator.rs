// WorkflowOrchestrator (§4.7): a todo-list-driven state machine with a
// human-approval gate. Unlike PlannerOrchestrator, execution never proceeds
// past `pre_verification` on its own — a UI action must move the workflow
// forward. UI actions only ever mutate the persisted `WorkflowStatus`; this
// orchestrator reads that state back in on the next `run` call rather than
// being driven directly by the button (§4.7 "UI actions mutate DB state;
// the Dispatcher reads that state on the next query").

use std::sync::Arc;

use conduit_contracts::{EventType, RequestHumanFeedbackData, WorkflowStatus};
use conduit_core::agent::ConversationAgent;
use conduit_core::atoms::CallModelAtom;
use conduit_core::config::AgentConfig;
use conduit_core::hierarchy::HierarchyTracker;
use conduit_core::traits::{EventEmitter, ToolExecutor};
use conduit_tools::virtual_tools::WorkspaceTools;
use uuid::Uuid;

use crate::cancellation::OrchestratorContext;
use crate::error::{OrchestratorError, Result};
use crate::plan::{StepResult, TodoList, Verdict, VerdictKind};

const TODO_FILE_PATH: &str = "todo.md";

/// A UI button press (§6 "single unified workflow update endpoint").
/// `Approve` and `Regenerate` both move a `pre_verification` workflow
/// forward; `RequestChanges` is the only action valid once a workflow has
/// already completed its first execution pass.
pub enum WorkflowAction {
    Approve,
    Regenerate,
    RequestChanges(String),
}

pub enum WorkflowOutcome {
    /// Todo list generated (or regenerated); waiting on a human decision.
    AwaitingApproval {
        todo_file_path: String,
        todos: Vec<String>,
    },
    /// Every todo item executed and validated.
    Completed { final_text: String, results: Vec<StepResult> },
    /// Refinement plan produced; the workflow is back at the approval gate.
    Refined {
        todo_file_path: String,
        todos: Vec<String>,
    },
}

pub struct WorkflowOrchestratorConfig {
    pub todo_planner_config: AgentConfig,
    pub executor_config: AgentConfig,
    pub validator_config: AgentConfig,
    pub refiner_config: AgentConfig,
}

/// Drives one workflow-mode session through `WorkflowStatus`'s three
/// states. Holds no DB connection itself — callers (the Dispatcher) persist
/// `WorkflowStatus` and hand it back in on the next `run` call.
pub struct WorkflowOrchestrator {
    session_id: Uuid,
    trace_id: Uuid,
    hierarchy: HierarchyTracker,
    config: WorkflowOrchestratorConfig,
    call_model: CallModelAtom,
    tool_executor: Arc<dyn ToolExecutor>,
    emitter: Arc<dyn EventEmitter>,
    workspace: Arc<WorkspaceTools>,
}

impl WorkflowOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: Uuid,
        trace_id: Uuid,
        config: WorkflowOrchestratorConfig,
        call_model: CallModelAtom,
        tool_executor: Arc<dyn ToolExecutor>,
        emitter: Arc<dyn EventEmitter>,
        workspace: Arc<WorkspaceTools>,
    ) -> Self {
        Self {
            session_id,
            trace_id,
            hierarchy: HierarchyTracker::new(session_id, trace_id),
            config,
            call_model,
            tool_executor,
            emitter,
            workspace,
        }
    }

    async fn emit(&mut self, event_type: EventType, data: serde_json::Value) {
        let event = self.hierarchy.record(event_type, None, data);
        let _ = self.emitter.emit(event).await;
    }

    fn root_span_id(&self) -> Uuid {
        self.hierarchy.root_span_id()
    }

    fn nested_agent(&self, config: AgentConfig) -> ConversationAgent {
        ConversationAgent::new_nested(
            config,
            self.session_id,
            self.trace_id,
            self.root_span_id(),
            1,
            self.call_model.clone(),
            self.tool_executor.clone(),
            self.emitter.clone(),
        )
    }

    /// The entry point the Dispatcher calls on every `/api/query` and
    /// `/api/workflow/update` request for a workflow-mode session: given
    /// the objective, the persisted `status`, and (if the caller pressed a
    /// button) a `WorkflowAction`, advance the state machine by exactly one
    /// step and return the new status the Dispatcher must persist alongside
    /// the outcome.
    pub async fn run(
        &mut self,
        objective: &str,
        status: WorkflowStatus,
        action: Option<WorkflowAction>,
        ctx: &OrchestratorContext,
    ) -> Result<(WorkflowStatus, WorkflowOutcome)> {
        if ctx.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        // Branch on persisted *state*, not on the action that (may have)
        // accompanied this query. The UI writes `workflow_status` directly
        // (`workflow_routes.rs`'s `update_workflow`) before the follow-up
        // continuation query ever reaches us, so by the time `run` sees an
        // `Approve` the status has *already* moved to `post_verification`
        // — an action can disambiguate within a state but can never
        // override what the state itself says to do (§4.7, testable
        // property 10).
        match status {
            WorkflowStatus::PreVerification => {
                let todos = self.plan_todos(objective).await?;
                Ok((
                    WorkflowStatus::PreVerification,
                    WorkflowOutcome::AwaitingApproval {
                        todo_file_path: TODO_FILE_PATH.to_string(),
                        todos: todos.items.into_iter().map(|t| t.description).collect(),
                    },
                ))
            }
            WorkflowStatus::PostVerification => match action {
                Some(WorkflowAction::RequestChanges(feedback)) => {
                    let todos = self.refine_todos(objective, &feedback).await?;
                    Ok((
                        WorkflowStatus::PostVerificationTodoRefinement,
                        WorkflowOutcome::Refined {
                            todo_file_path: TODO_FILE_PATH.to_string(),
                            todos: todos.items.into_iter().map(|t| t.description).collect(),
                        },
                    ))
                }
                // Approve, Regenerate, or a bare continuation with no
                // action at all mean the same thing once the status is
                // already `post_verification`: run the approved todo list.
                _ => {
                    self.emit(EventType::WorkflowApproved, serde_json::json!({})).await;
                    let (results, verdict) = self.execute_and_validate().await?;
                    self.transition_after_execution(results, verdict).await
                }
            },
            WorkflowStatus::PostVerificationTodoRefinement => {
                self.emit(EventType::WorkflowApproved, serde_json::json!({})).await;
                let (results, verdict) = self.execute_and_validate().await?;
                self.transition_after_execution(results, verdict).await
            }
        }
    }

    async fn transition_after_execution(
        &mut self,
        results: Vec<StepResult>,
        verdict: Verdict,
    ) -> Result<(WorkflowStatus, WorkflowOutcome)> {
        match verdict.verdict {
            VerdictKind::Complete => {
                let final_text = results
                    .last()
                    .map(|r| r.final_text.clone())
                    .unwrap_or_default();
                Ok((
                    WorkflowStatus::PostVerification,
                    WorkflowOutcome::Completed { final_text, results },
                ))
            }
            VerdictKind::Continue | VerdictKind::Refine => {
                let todos = self.refine_todos("continue the remaining work", &verdict.rationale).await?;
                Ok((
                    WorkflowStatus::PostVerificationTodoRefinement,
                    WorkflowOutcome::Refined {
                        todo_file_path: TODO_FILE_PATH.to_string(),
                        todos: todos.items.into_iter().map(|t| t.description).collect(),
                    },
                ))
            }
        }
    }

    /// `pre_verification` entry: generate a todo list, persist it as
    /// `todo.md` via workspace tools, and request human feedback (§4.7
    /// "generates a todo list, saves it via workspace tools").
    async fn plan_todos(&mut self, objective: &str) -> Result<TodoList> {
        self.emit(EventType::WorkflowTodoPlanningStart, serde_json::json!({})).await;

        let mut planner = self.nested_agent(self.config.todo_planner_config.clone());
        let question = format!("Break this objective into a todo list:\n\n{objective}");
        let todos = planner
            .invoke_structured::<TodoList>(question, TodoList::SCHEMA_JSON)
            .await
            .map_err(|err| OrchestratorError::InvalidPlan(err.to_string()))?;

        self.workspace
            .write_file(TODO_FILE_PATH, &todos.to_markdown())
            .await?;

        self.emit(
            EventType::WorkflowTodoPlanningEnd,
            serde_json::json!({ "item_count": todos.items.len() }),
        )
        .await;

        self.emit(
            EventType::RequestHumanFeedback,
            serde_json::to_value(RequestHumanFeedbackData {
                todo_file_path: TODO_FILE_PATH.to_string(),
                todos: todos.items.iter().map(|t| t.description.clone()).collect(),
            })
            .unwrap_or(serde_json::Value::Null),
        )
        .await;

        Ok(todos)
    }

    /// `post_verification_todo_refinement`: a refinement planner reads the
    /// existing `todo.md` plus execution history or human feedback and
    /// produces an updated list, then the workflow returns to the approval
    /// gate (§4.7 "back to approval gate on refinement").
    async fn refine_todos(&mut self, context: &str, feedback: &str) -> Result<TodoList> {
        self.emit(EventType::WorkflowRefinementStart, serde_json::json!({})).await;

        let existing = self.workspace.read_file(TODO_FILE_PATH).await.unwrap_or_default();
        let mut refiner = self.nested_agent(self.config.refiner_config.clone());
        let question = format!(
            "Existing todo list:\n{existing}\n\nContext: {context}\n\nFeedback requiring changes: {feedback}\n\n\
             Produce a revised todo list."
        );
        let todos = refiner
            .invoke_structured::<TodoList>(question, TodoList::SCHEMA_JSON)
            .await
            .map_err(|err| OrchestratorError::InvalidPlan(err.to_string()))?;

        self.workspace
            .write_file(TODO_FILE_PATH, &todos.to_markdown())
            .await?;

        self.emit(
            EventType::WorkflowRefinementEnd,
            serde_json::json!({ "item_count": todos.items.len() }),
        )
        .await;

        self.emit(EventType::WorkflowRegenerated, serde_json::json!({})).await;

        Ok(todos)
    }

    /// `post_verification`: execute every approved todo item, then validate
    /// the batch as a whole (§4.7 "execution-agent-per-todo + a validation
    /// agent").
    async fn execute_and_validate(&mut self) -> Result<(Vec<StepResult>, Verdict)> {
        let todos = TodoList::from_markdown(&self.workspace.read_file(TODO_FILE_PATH).await?);

        let mut results = Vec::with_capacity(todos.items.len());
        for item in &todos.items {
            self.emit(
                EventType::WorkflowExecutionStart,
                serde_json::json!({ "todo_id": item.id, "description": item.description }),
            )
            .await;

            let mut executor = self.nested_agent(self.config.executor_config.clone());
            let outcome = executor.invoke(item.description.clone()).await?;

            self.emit(
                EventType::WorkflowExecutionEnd,
                serde_json::json!({ "todo_id": item.id, "status": outcome.status.as_str() }),
            )
            .await;

            results.push(StepResult {
                step_id: item.id.clone(),
                final_text: outcome.final_text,
                status: outcome.status.as_str().to_string(),
            });
        }

        self.emit(EventType::WorkflowValidationStart, serde_json::json!({})).await;

        let mut validator = self.nested_agent(self.config.validator_config.clone());
        let results_text = results
            .iter()
            .map(|r| format!("- {} ({}): {}", r.step_id, r.status, r.final_text))
            .collect::<Vec<_>>()
            .join("\n");
        let question = format!("Todo execution results:\n{results_text}\n\nIs the workflow complete?");
        let verdict = validator
            .invoke_structured::<Verdict>(question, Verdict::SCHEMA_JSON)
            .await
            .map_err(|err| OrchestratorError::InvalidVerdict(err.to_string()))?;

        self.emit(
            EventType::WorkflowValidationEnd,
            serde_json::json!({ "verdict": verdict.verdict, "rationale": verdict.rationale }),
        )
        .await;

        Ok((results, verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_action_combination_is_rejected() {
        let err = OrchestratorError::InvalidWorkflowState {
            actual: WorkflowStatus::PostVerification.to_string(),
        };
        assert!(err.to_string().contains("post_verification"));
    }
}
