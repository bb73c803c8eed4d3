mod builder;
mod state;

use std::fmt::{self, Display};
use std::sync::Arc;

use research_agent_model::{Decision, ErrorKind as ModelErrorKind};
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::conversation::TranscriptSource;
use crate::model_client::ModelClient;
use crate::tool::ToolRegistry;
pub use builder::{AgentBuilder, DEFAULT_STEP_BUDGET};
use builder::AgentConfig;
use state::{AgentStage, RunState, StepBudget};

pub(crate) type TranscriptFn = Arc<dyn Fn(&str, TranscriptSource) + Send + Sync>;

/// How a run ended, when it didn't fail.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// The model produced a final answer.
    Completed {
        /// The answer.
        answer: String,
        /// Tool cycles charged to the budget.
        steps: u32,
    },
    /// The step budget ran out before the model answered.
    BudgetExhausted {
        /// The last thing the model said, if anything.
        partial: Option<String>,
        /// Tool cycles charged to the budget.
        steps: u32,
    },
    /// The caller aborted the run.
    Aborted {
        /// Tool cycles charged to the budget.
        steps: u32,
    },
}

impl RunOutcome {
    /// Returns the final answer, if the run completed.
    #[inline]
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { answer, .. } => Some(answer),
            _ => None,
        }
    }

    /// Returns the number of cycles charged to the budget.
    #[inline]
    pub fn steps(&self) -> u32 {
        match self {
            RunOutcome::Completed { steps, .. }
            | RunOutcome::BudgetExhausted { steps, .. }
            | RunOutcome::Aborted { steps } => *steps,
        }
    }

    /// Returns `true` if the model produced a final answer.
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

impl Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { answer, .. } => f.write_str(answer),
            RunOutcome::BudgetExhausted {
                partial: Some(partial),
                steps,
            } => write!(
                f,
                "Could not complete the task within {steps} steps. Last \
                 progress: {partial}"
            ),
            RunOutcome::BudgetExhausted {
                partial: None,
                steps,
            } => {
                write!(f, "Could not complete the task within {steps} steps.")
            }
            RunOutcome::Aborted { steps } => {
                write!(f, "The run was aborted after {steps} steps.")
            }
        }
    }
}

/// Why a run failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// The model provider returned an error. These are not retried.
    #[error("model provider failed ({kind}): {message}")]
    Provider {
        /// The kind reported by the provider.
        kind: ModelErrorKind,
        /// The provider's error message.
        message: String,
    },
    /// The model kept sending unusable responses.
    #[error("the model sent {count} malformed responses in a row: {reason}")]
    ModelProtocol {
        /// Consecutive malformed responses.
        count: u32,
        /// Why the last one was rejected.
        reason: String,
    },
    /// The task driving a spawned run stopped before returning.
    #[error("the run stopped unexpectedly: {0}")]
    Interrupted(String),
}

struct AgentInner {
    model_client: ModelClient,
    tools: ToolRegistry,
    config: AgentConfig,
    on_transcript: Option<TranscriptFn>,
}

/// An agent: a model provider and a set of tools, driven by a bounded
/// reason-act-observe loop.
///
/// Every run owns its conversation and its step budget, so one agent may
/// serve several runs at the same time. Tools shared between runs (like a
/// note store) are expected to serialize their own writes.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Returns the registered tools.
    #[inline]
    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    /// Returns the number of tool cycles each run may perform.
    #[inline]
    pub fn step_budget(&self) -> u32 {
        self.inner.config.step_budget
    }

    /// Runs `task` to the end.
    pub async fn run<S: Into<String>>(
        &self,
        task: S,
    ) -> Result<RunOutcome, RunError> {
        // Keep the sender alive, so the signal never fires.
        let (_abort_tx, abort_rx) = watch::channel(false);
        self.run_until_aborted(task.into(), abort_rx).await
    }

    /// Runs `task` on a new task, returning a handle that can abort it.
    pub fn spawn_run<S: Into<String>>(&self, task: S) -> RunHandle {
        let (abort_tx, abort_rx) = watch::channel(false);
        let agent = self.clone();
        let task = task.into();
        let join =
            tokio::spawn(
                async move { agent.run_until_aborted(task, abort_rx).await },
            );
        RunHandle { abort_tx, join }
    }

    async fn run_until_aborted(
        &self,
        task: String,
        mut abort_rx: watch::Receiver<bool>,
    ) -> Result<RunOutcome, RunError> {
        let inner = &self.inner;
        let config = &inner.config;
        let span = debug_span!("agent run", budget = config.step_budget);

        async move {
            let mut state = RunState::new(
                task,
                config.system_prompt.as_deref(),
                StepBudget::new(config.step_budget),
                inner.on_transcript.clone(),
            );
            let tools = inner.tools.definitions();

            loop {
                trace!("stage: {:?}", state.stage);
                if *abort_rx.borrow() {
                    return Ok(state.abort());
                }
                if state.budget.is_exhausted() {
                    return Ok(state.exhaust());
                }

                debug!(
                    "awaiting model ({} steps left)",
                    state.budget.remaining()
                );
                let request = state.build_model_request(tools.clone());
                let response = select! {
                    response = inner.model_client.send_request(request, |_| {}) => response,
                    // An error means the handle is gone, so nobody can
                    // abort anymore and the branch is disabled.
                    Ok(_) = abort_rx.wait_for(|aborted| *aborted) => {
                        return Ok(state.abort());
                    }
                };
                let response = response.map_err(|err| RunError::Provider {
                    kind: err.kind(),
                    message: err.to_string(),
                })?;

                match response.into_decision() {
                    Decision::ToolCalls { message, calls } => {
                        debug!("model requested {} tool call(s)", calls.len());
                        state.record_tool_calls(message, calls.clone());
                        for call in calls {
                            let observation = inner.tools.invoke(&call).await;
                            state.record_observation(call.id, observation);
                        }
                        state.finish_cycle();
                    }
                    Decision::FinalAnswer(answer) => {
                        debug!(
                            "model answered after {} steps",
                            state.budget.used()
                        );
                        state.record_answer(answer.clone());
                        return Ok(RunOutcome::Completed {
                            answer,
                            steps: state.budget.used(),
                        });
                    }
                    Decision::Malformed { message, reason } => {
                        warn!("malformed model response: {reason}");
                        state.record_malformed(message, &reason);
                        if let Some(limit) = config.malformed_limit {
                            if state.malformed_streak >= limit {
                                return Err(RunError::ModelProtocol {
                                    count: state.malformed_streak,
                                    reason,
                                });
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl RunState {
    fn abort(&mut self) -> RunOutcome {
        debug!("run aborted");
        self.stage = AgentStage::Aborted;
        RunOutcome::Aborted {
            steps: self.budget.used(),
        }
    }

    fn exhaust(&mut self) -> RunOutcome {
        warn!("step budget exhausted after {} steps", self.budget.used());
        self.stage = AgentStage::BudgetExhausted;
        RunOutcome::BudgetExhausted {
            partial: self.conversation.last_assistant_text().map(str::to_owned),
            steps: self.budget.used(),
        }
    }
}

/// A handle to a run started by [`Agent::spawn_run`].
pub struct RunHandle {
    abort_tx: watch::Sender<bool>,
    join: JoinHandle<Result<RunOutcome, RunError>>,
}

impl RunHandle {
    /// Asks the run to stop.
    ///
    /// The run stops before its next model request, or while waiting for
    /// the model. A tool that's already running is allowed to finish.
    #[inline]
    pub fn abort(&self) {
        self.abort_tx.send_replace(true);
    }

    /// Waits for the run to end.
    pub async fn outcome(self) -> Result<RunOutcome, RunError> {
        self.join
            .await
            .map_err(|err| RunError::Interrupted(err.to_string()))?
    }
}
