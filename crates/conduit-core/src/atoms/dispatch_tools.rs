// DISPATCH_TOOLS step (§4.1, §5 "concurrent tool calls within one turn are
// executed sequentially in the order returned by the LLM to make hierarchy
// assignment deterministic").
//
// Dispatches exactly one tool call; `ConversationAgent` iterates its turn's
// tool_calls list and invokes this atom once per call, in order, emitting
// tool_call_start/tool_call_end around each invocation so the hierarchy
// tracker sees one start/end pair per call rather than one for the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_contracts::{ToolCall, ToolResult};

use super::Atom;
use crate::error::Result;
use crate::traits::ToolExecutor;

pub struct DispatchToolsInput {
    pub tool_call: ToolCall,
    pub tool_timeout: Duration,
}

pub struct DispatchToolsOutput {
    pub result: ToolResult,
    pub timed_out: bool,
}

pub struct DispatchToolsAtom {
    executor: Arc<dyn ToolExecutor>,
}

impl DispatchToolsAtom {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Atom for DispatchToolsAtom {
    type Input = DispatchToolsInput;
    type Output = DispatchToolsOutput;

    fn name(&self) -> &'static str {
        "dispatch_tools"
    }

    async fn execute(&self, input: Self::Input) -> Result<Self::Output> {
        let outcome = tokio::time::timeout(
            input.tool_timeout,
            self.executor.execute(&input.tool_call),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => Ok(DispatchToolsOutput {
                result,
                timed_out: false,
            }),
            Ok(Err(err)) => Ok(DispatchToolsOutput {
                result: ToolResult::error(input.tool_call.id.clone(), err.to_string()),
                timed_out: false,
            }),
            Err(_elapsed) => Ok(DispatchToolsOutput {
                result: ToolResult::error(
                    input.tool_call.id.clone(),
                    format!("tool '{}' timed out", input.tool_call.name),
                ),
                timed_out: true,
            }),
        }
    }
}
