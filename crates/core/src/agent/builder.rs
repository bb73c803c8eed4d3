use std::sync::Arc;

use research_agent_model::ModelProvider;

use super::{Agent, AgentInner, TranscriptFn};
use crate::conversation::TranscriptSource;
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, RegistryError, Tool, ToolObject, ToolRegistry};

/// The step budget used when none is configured.
pub const DEFAULT_STEP_BUDGET: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AgentConfig {
    pub system_prompt: Option<String>,
    pub step_budget: u32,
    pub malformed_limit: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            step_budget: DEFAULT_STEP_BUDGET,
            malformed_limit: None,
        }
    }
}

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    config: AgentConfig,
    on_transcript: Option<TranscriptFn>,
    tools: Vec<Arc<dyn ToolObject>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            config: AgentConfig::default(),
            on_transcript: None,
            tools: vec![],
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Sets how many tool cycles a run may perform before it's stopped.
    ///
    /// Defaults to [`DEFAULT_STEP_BUDGET`].
    #[inline]
    pub fn with_step_budget(mut self, steps: u32) -> Self {
        self.config.step_budget = steps;
        self
    }

    /// Fails a run once the model sends `limit` malformed responses in a
    /// row. A limit of `0` is treated as `1`.
    ///
    /// Without a limit, malformed responses are corrected and retried for
    /// as long as the step budget allows.
    #[inline]
    pub fn with_malformed_limit(mut self, limit: u32) -> Self {
        self.config.malformed_limit = Some(limit.max(1));
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(AnyTool(tool)));
        self
    }

    /// Builds the agent.
    ///
    /// Fails if two tools share a name.
    pub fn build(self) -> Result<Agent, RegistryError> {
        let AgentBuilder {
            model_client,
            config,
            on_transcript,
            tools: tool_objects,
        } = self;

        let mut tools = ToolRegistry::new();
        for tool in tool_objects {
            tools.register_object(tool)?;
        }

        let inner = AgentInner {
            model_client,
            tools,
            config,
            on_transcript,
        };
        Ok(Agent {
            inner: Arc::new(inner),
        })
    }
}
