// Construction options for a ConversationAgent (§4.1 "Construction options")

use std::time::Duration;

use conduit_contracts::AgentMode;

fn default_max_turns() -> u32 {
    10
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Thresholds that trigger `SmartRouter` filtering (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct SmartRoutingThresholds {
    pub max_tools: usize,
    pub max_servers: usize,
}

impl Default for SmartRoutingThresholds {
    fn default() -> Self {
        Self {
            max_tools: 30,
            max_servers: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactMode {
    Simple,
    React,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub mode: ReactMode,
    pub agent_mode: AgentMode,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_turns: u32,
    pub tool_timeout: Duration,
    pub enable_smart_routing: bool,
    pub smart_routing_thresholds: SmartRoutingThresholds,
    pub enable_large_output_virtual_tools: bool,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            mode: ReactMode::Simple,
            agent_mode: AgentMode::Simple,
            model: model.into(),
            system_prompt: None,
            temperature: None,
            max_turns: default_max_turns(),
            tool_timeout: default_tool_timeout(),
            enable_smart_routing: true,
            smart_routing_thresholds: SmartRoutingThresholds::default(),
            enable_large_output_virtual_tools: true,
        }
    }
}

/// Fluent builder; every option past the model id is optional (§4.1).
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            config: AgentConfig::new(model),
        }
    }

    pub fn mode(mut self, mode: ReactMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn agent_mode(mut self, agent_mode: AgentMode) -> Self {
        self.config.agent_mode = agent_mode;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.config.max_turns = max_turns;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn enable_smart_routing(mut self, enabled: bool) -> Self {
        self.config.enable_smart_routing = enabled;
        self
    }

    pub fn smart_routing_thresholds(mut self, thresholds: SmartRoutingThresholds) -> Self {
        self.config.smart_routing_thresholds = thresholds;
        self
    }

    pub fn enable_large_output_virtual_tools(mut self, enabled: bool) -> Self {
        self.config.enable_large_output_virtual_tools = enabled;
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_spec() {
        let config = AgentConfigBuilder::new("gpt-4o").build();
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.tool_timeout, Duration::from_secs(120));
        assert!(config.enable_smart_routing);
        assert_eq!(config.smart_routing_thresholds.max_tools, 30);
        assert_eq!(config.smart_routing_thresholds.max_servers, 4);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = AgentConfigBuilder::new("gpt-4o")
            .mode(ReactMode::React)
            .max_turns(5)
            .enable_smart_routing(false)
            .build();
        assert_eq!(config.mode, ReactMode::React);
        assert_eq!(config.max_turns, 5);
        assert!(!config.enable_smart_routing);
    }
}
