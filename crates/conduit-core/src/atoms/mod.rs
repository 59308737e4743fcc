// Atomic operations composed by ConversationAgent's turn loop (§4.1).
//
// Each atom is a self-contained step of BUILD_MESSAGES / CALL_LLM /
// DISPATCH_TOOLS; state (messages, hierarchy tracker) lives in the agent,
// atoms are stateless executors over borrowed state.

use async_trait::async_trait;

use crate::error::Result;

mod call_model;
mod dispatch_tools;

pub use call_model::{CallModelAtom, CallModelInput, CallModelOutput};
pub use dispatch_tools::{DispatchToolsAtom, DispatchToolsInput, DispatchToolsOutput};

#[async_trait]
pub trait Atom: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output>;
}
