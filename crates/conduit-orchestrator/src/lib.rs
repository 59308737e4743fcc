//! PlannerOrchestrator and WorkflowOrchestrator (§4.5, §4.7): multi-agent
//! planning/execution/validation loops that run three `ConversationAgent`
//! instances under a single parent trace, plus the state-driven workflow
//! variant with its human-approval gate. Neither orchestrator creates a new
//! `Session` for its sub-agents — one session per request, always (§4.5
//! invariant).

pub mod cancellation;
pub mod error;
pub mod plan;
pub mod planner_orchestrator;
pub mod workflow_orchestrator;

pub use cancellation::OrchestratorContext;
pub use error::{OrchestratorError, Result};
pub use plan::{Plan, PlanStep, StepResult, TodoItem, TodoList, Verdict, VerdictKind};
pub use planner_orchestrator::{
    IterationOutcome, PlannerOrchestrator, PlannerOrchestratorConfig, PlannerOutcome,
};
pub use workflow_orchestrator::{
    WorkflowAction, WorkflowOrchestrator, WorkflowOrchestratorConfig, WorkflowOutcome,
};
