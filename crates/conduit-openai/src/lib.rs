// OpenAI chat-completions driver (§6 "concrete LLM provider SDKs treated
// as a provider interface — see §6").

mod provider;

pub use provider::OpenAiProvider;
