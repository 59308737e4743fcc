// Conversation loop, event hierarchy tracking, smart routing and structured
// output (§4.1, §4.6, §4.8, §4.9). This is the engine room: it knows
// nothing about HTTP, Postgres, or any concrete LLM SDK — those are
// supplied by conduit-api, conduit-storage, conduit-openai/conduit-anthropic
// through the traits in `traits` and `llm`.

pub mod agent;
pub mod atoms;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod llm;
pub mod message;
pub mod retry;
pub mod router;
pub mod structured;
pub mod traits;

pub use agent::{ConversationAgent, TerminalStatus};
pub use config::{AgentConfig, AgentConfigBuilder, ReactMode, SmartRoutingThresholds};
pub use error::{CoreError, Result};
pub use hierarchy::HierarchyTracker;
pub use message::{ConversationMessage, MessageRole};
