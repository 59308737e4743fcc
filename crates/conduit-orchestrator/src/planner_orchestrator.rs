// PlannerOrchestrator (§4.5): decomposes an objective into a plan, executes
// it step by step, validates, and loops — all under one parent trace. Three
// `ConversationAgent`s (planner, executor, validator) share `trace_id`;
// their events nest under the orchestrator's own root span rather than
// starting new root spans (§4.5 invariant).

use std::sync::Arc;
use std::time::Instant;

use conduit_contracts::{EventType, UnifiedCompletionData};
use conduit_core::agent::{ConversationAgent, TerminalStatus};
use conduit_core::atoms::CallModelAtom;
use conduit_core::config::AgentConfig;
use conduit_core::hierarchy::HierarchyTracker;
use conduit_core::traits::{EventEmitter, ToolExecutor};
use uuid::Uuid;

use crate::cancellation::OrchestratorContext;
use crate::error::{OrchestratorError, Result};
use crate::plan::{Plan, PlanStep, StepResult, Verdict, VerdictKind};

pub struct PlannerOrchestratorConfig {
    pub planner_config: AgentConfig,
    pub executor_config: AgentConfig,
    pub validator_config: AgentConfig,
    /// Iteration cap (§4.5 "iteration_cap reached → stop with
    /// status=max_turns_reached").
    pub max_iterations: u32,
}

/// What a validator's `Verdict` means for the iteration loop: `Continue`
/// and `Refine` both just mean "loop again" from this orchestrator's point
/// of view — the distinction matters to the planner's next prompt, not to
/// the control flow deciding whether to keep looping.
pub enum IterationOutcome {
    Complete,
    ContinueLooping,
}

impl From<VerdictKind> for IterationOutcome {
    fn from(verdict: VerdictKind) -> Self {
        match verdict {
            VerdictKind::Complete => IterationOutcome::Complete,
            VerdictKind::Continue | VerdictKind::Refine => IterationOutcome::ContinueLooping,
        }
    }
}

pub struct PlannerOutcome {
    pub final_text: String,
    pub status: TerminalStatus,
    pub iterations: u32,
}

/// Planner → executor → validator loop, sharing one `trace_id` and nesting
/// under a single `orchestrator_start`/`orchestrator_end` span pair.
pub struct PlannerOrchestrator {
    session_id: Uuid,
    trace_id: Uuid,
    hierarchy: HierarchyTracker,
    config: PlannerOrchestratorConfig,
    call_model: CallModelAtom,
    tool_executor: Arc<dyn ToolExecutor>,
    emitter: Arc<dyn EventEmitter>,
}

impl PlannerOrchestrator {
    pub fn new(
        session_id: Uuid,
        trace_id: Uuid,
        config: PlannerOrchestratorConfig,
        call_model: CallModelAtom,
        tool_executor: Arc<dyn ToolExecutor>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            session_id,
            trace_id,
            hierarchy: HierarchyTracker::new(session_id, trace_id),
            config,
            call_model,
            tool_executor,
            emitter,
        }
    }

    async fn emit(&mut self, event_type: EventType, data: serde_json::Value) {
        let event = self.hierarchy.record(event_type, None, data);
        let _ = self.emitter.emit(event).await;
    }

    fn root_span_id(&self) -> Uuid {
        self.hierarchy.root_span_id()
    }

    /// Runs the planner → executor → validator loop to completion (§4.5
    /// "Top-level state (one iteration)"). `ctx` is the orchestrator's own
    /// cancellation context (§5), independent of the HTTP request that
    /// kicked the run off — an explicit session stop or orchestrator
    /// timeout ends the loop at the next iteration boundary rather than mid
    /// sub-agent call.
    pub async fn run(&mut self, objective: impl Into<String>, ctx: &OrchestratorContext) -> Result<PlannerOutcome> {
        let objective = objective.into();
        let start = Instant::now();

        self.emit(EventType::OrchestratorStart, serde_json::json!({ "objective": objective })).await;

        let mut plan = Plan::default();
        let mut results: Vec<StepResult> = Vec::new();
        let mut iteration: u32 = 0;
        let mut last_text = String::new();

        let (status, final_text) = loop {
            if ctx.is_cancelled() {
                break (TerminalStatus::Cancelled, last_text.clone());
            }
            if iteration >= self.config.max_iterations {
                break (TerminalStatus::MaxTurnsReached, last_text.clone());
            }
            iteration += 1;

            self.emit(
                EventType::OrchestratorIterationStart,
                serde_json::json!({ "iteration": iteration }),
            )
            .await;

            plan = self.plan(&objective, &plan, &results).await?;

            results = Vec::with_capacity(plan.steps.len());
            for step in &plan.steps {
                let result = self.execute_step(step).await?;
                last_text = result.final_text.clone();
                results.push(result);
            }

            let verdict = self.validate(&plan, &results).await?;

            self.emit(
                EventType::OrchestratorIterationEnd,
                serde_json::json!({ "iteration": iteration, "verdict": verdict.verdict }),
            )
            .await;

            match IterationOutcome::from(verdict.verdict) {
                IterationOutcome::Complete => break (TerminalStatus::Completed, last_text.clone()),
                IterationOutcome::ContinueLooping => continue,
            }
        };

        self.emit(
            EventType::OrchestratorEnd,
            serde_json::json!({ "status": status.as_str(), "iterations": iteration }),
        )
        .await;

        let completion = UnifiedCompletionData {
            agent_type: "planner_orchestrator".into(),
            agent_mode: "orchestrator".into(),
            question: objective,
            final_result: final_text.clone(),
            status: status.as_str().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            turns: iteration,
            error: None,
        };
        self.emit(
            EventType::UnifiedCompletion,
            serde_json::to_value(completion).unwrap_or(serde_json::Value::Null),
        )
        .await;

        Ok(PlannerOutcome {
            final_text,
            status,
            iterations: iteration,
        })
    }

    async fn plan(&mut self, objective: &str, prior: &Plan, results: &[StepResult]) -> Result<Plan> {
        self.emit(EventType::OrchestratorPlanningStart, serde_json::json!({})).await;

        let mut planner = self.nested_agent(self.config.planner_config.clone());
        let question = render_planning_prompt(objective, prior, results);

        let plan = planner
            .invoke_structured::<Plan>(question, Plan::SCHEMA_JSON)
            .await
            .map_err(|err| OrchestratorError::InvalidPlan(err.to_string()))?;

        if plan.steps.is_empty() {
            return Err(OrchestratorError::InvalidPlan("planner produced zero steps".into()));
        }

        self.emit(
            EventType::OrchestratorPlanningEnd,
            serde_json::json!({ "step_count": plan.steps.len() }),
        )
        .await;

        Ok(plan)
    }

    async fn execute_step(&mut self, step: &PlanStep) -> Result<StepResult> {
        self.emit(
            EventType::OrchestratorExecutionStart,
            serde_json::json!({ "step_id": step.id, "description": step.description }),
        )
        .await;

        let mut executor = self.nested_agent(self.config.executor_config.clone());
        executor.seed_allowed_providers(step.tool_servers_hint.clone());
        let outcome = executor.invoke(step.description.clone()).await?;

        self.emit(
            EventType::OrchestratorExecutionEnd,
            serde_json::json!({ "step_id": step.id, "status": outcome.status.as_str() }),
        )
        .await;

        Ok(StepResult {
            step_id: step.id.clone(),
            final_text: outcome.final_text,
            status: outcome.status.as_str().to_string(),
        })
    }

    async fn validate(&mut self, plan: &Plan, results: &[StepResult]) -> Result<Verdict> {
        self.emit(EventType::OrchestratorValidationStart, serde_json::json!({})).await;

        let mut validator = self.nested_agent(self.config.validator_config.clone());
        let question = render_validation_prompt(plan, results);

        let verdict = validator
            .invoke_structured::<Verdict>(question, Verdict::SCHEMA_JSON)
            .await
            .map_err(|err| OrchestratorError::InvalidVerdict(err.to_string()))?;

        self.emit(
            EventType::OrchestratorValidationEnd,
            serde_json::json!({ "verdict": verdict.verdict, "rationale": verdict.rationale }),
        )
        .await;

        Ok(verdict)
    }

    /// Builds a sub-agent nested under the orchestrator's root span, with
    /// the orchestrator's own `trace_id` (§4.5 invariant: "all three
    /// subordinate agents share the same trace_id and emit events with
    /// parent_id pointing back to the orchestrator root span").
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
}

fn render_planning_prompt(objective: &str, prior: &Plan, results: &[StepResult]) -> String {
    if prior.steps.is_empty() {
        format!("Produce a step-by-step plan for this objective:\n\n{objective}")
    } else {
        let results_text = results
            .iter()
            .map(|r| format!("- {} ({}): {}", r.step_id, r.status, r.final_text))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Objective: {objective}\n\nPrevious plan had {} steps. Results so far:\n{results_text}\n\n\
             Produce the remaining steps needed to complete the objective.",
            prior.steps.len()
        )
    }
}

fn render_validation_prompt(plan: &Plan, results: &[StepResult]) -> String {
    let results_text = results
        .iter()
        .map(|r| format!("- {} ({}): {}", r.step_id, r.status, r.final_text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Plan had {} steps. Execution results:\n{results_text}\n\n\
         Decide whether the objective is fully satisfied (complete), more work is needed with \
         the existing plan shape (continue), or the plan itself needs to change (refine).",
        plan.steps.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_prompt_mentions_prior_results_on_subsequent_iterations() {
        let plan = Plan {
            steps: vec![PlanStep {
                id: "s1".into(),
                description: "do a thing".into(),
                tool_servers_hint: vec![],
            }],
        };
        let results = vec![StepResult {
            step_id: "s1".into(),
            final_text: "done".into(),
            status: "completed".into(),
        }];
        let prompt = render_planning_prompt("ship the feature", &plan, &results);
        assert!(prompt.contains("Previous plan had 1 steps"));
        assert!(prompt.contains("done"));
    }

    #[test]
    fn first_iteration_planning_prompt_has_no_prior_results() {
        let prompt = render_planning_prompt("ship the feature", &Plan::default(), &[]);
        assert!(prompt.contains("Produce a step-by-step plan"));
    }
}
