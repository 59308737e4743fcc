// Anthropic Messages API driver (§6 "concrete LLM provider SDKs treated
// as a provider interface").

mod provider;

pub use provider::AnthropicProvider;
