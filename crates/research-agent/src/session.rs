use research_agent_core::model::ModelProvider;
use research_agent_core::tool::RegistryError;
use research_agent_core::{
    Agent, AgentBuilder, RunError, RunHandle, RunOutcome, TranscriptSource,
};

use crate::notes::Notebook;
use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    notebook: Notebook,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            notebook: Notebook::new(),
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets how many tool cycles each task may perform.
    #[inline]
    pub fn with_step_budget(mut self, steps: u32) -> Self {
        self.agent_builder = self.agent_builder.with_step_budget(steps);
        self
    }

    /// Fails a task once the model sends `limit` malformed responses in a
    /// row.
    #[inline]
    pub fn with_malformed_limit(mut self, limit: u32) -> Self {
        self.agent_builder = self.agent_builder.with_malformed_limit(limit);
        self
    }

    /// Uses `notebook` instead of a fresh one, e.g. to share notes between
    /// sessions.
    #[inline]
    pub fn with_notebook(mut self, notebook: Notebook) -> Self {
        self.notebook = notebook;
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Builds a new session with the built-in tools.
    pub fn build(self) -> Result<Session, RegistryError> {
        let SessionBuilder {
            agent_builder,
            notebook,
        } = self;

        let agent = agent_builder
            .with_tool(GreetTool::new())
            .with_tool(AddNumbersTool::new())
            .with_tool(SaveNoteTool::new(notebook.clone()))
            .with_tool(GetNotesTool::new(notebook.clone()))
            .with_tool(CalculateTool::new())
            .build()?;

        Ok(Session { agent, notebook })
    }
}

/// A research session: an agent wired to the built-in tools, and the
/// notebook they write to.
///
/// Notes outlive individual tasks, so a later task can read what an earlier
/// one saved.
pub struct Session {
    agent: Agent,
    notebook: Notebook,
}

impl Session {
    /// Runs a task to the end.
    #[inline]
    pub async fn run(&self, task: &str) -> Result<RunOutcome, RunError> {
        self.agent.run(task).await
    }

    /// Runs a task in the background, returning a handle that can abort it.
    #[inline]
    pub fn spawn_run(&self, task: &str) -> RunHandle {
        self.agent.spawn_run(task)
    }

    /// Returns the notebook shared by this session's tools.
    #[inline]
    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
