use research_agent_model::{ModelRequest, ModelTool, ToolCallRequest};

use super::TranscriptFn;
use crate::conversation::Conversation;
use crate::tool::Observation;

/// Where a run currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgentStage {
    #[default]
    AwaitingModel,
    AwaitingToolResult,
    Done,
    BudgetExhausted,
    Aborted,
}

/// The number of model-call/tool-execution cycles a run may still perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepBudget {
    limit: u32,
    used: u32,
}

impl StepBudget {
    #[inline]
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    #[inline]
    pub fn used(&self) -> u32 {
        self.used
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Charges one cycle. Does nothing once the budget is exhausted.
    #[inline]
    pub fn consume(&mut self) {
        if !self.is_exhausted() {
            self.used += 1;
        }
    }
}

/// The state owned by one run: its conversation, its budget, and the
/// stage the loop is in.
pub struct RunState {
    pub conversation: Conversation,
    pub budget: StepBudget,
    pub stage: AgentStage,
    pub malformed_streak: u32,
    free_retry_used: bool,
    on_transcript: Option<TranscriptFn>,
}

impl RunState {
    pub fn new(
        task: String,
        system_prompt: Option<&str>,
        budget: StepBudget,
        on_transcript: Option<TranscriptFn>,
    ) -> Self {
        let mut state = Self {
            conversation: Conversation::default(),
            budget,
            stage: AgentStage::default(),
            malformed_streak: 0,
            free_retry_used: false,
            on_transcript,
        };
        if let Some(prompt) = system_prompt {
            state.conversation.push_system(prompt.to_owned());
        }
        state.conversation.push_user(task);
        state.notify_last();
        state
    }

    pub fn build_model_request(&self, tools: Vec<ModelTool>) -> ModelRequest {
        ModelRequest {
            messages: self.conversation.messages(),
            tools,
            remaining_steps: Some(self.budget.remaining()),
        }
    }

    pub fn record_tool_calls(
        &mut self,
        message: String,
        calls: Vec<ToolCallRequest>,
    ) {
        self.malformed_streak = 0;
        self.stage = AgentStage::AwaitingToolResult;
        self.conversation.push_assistant(message, calls);
        self.notify_last();
    }

    pub fn record_observation(&mut self, id: String, observation: Observation) {
        self.conversation
            .push_tool_result(id, observation.into_content());
        self.notify_last();
    }

    /// Closes a tool cycle and charges it to the budget.
    pub fn finish_cycle(&mut self) {
        self.budget.consume();
        self.stage = AgentStage::AwaitingModel;
    }

    pub fn record_answer(&mut self, answer: String) {
        self.malformed_streak = 0;
        self.stage = AgentStage::Done;
        self.conversation.push_assistant(answer, vec![]);
        self.notify_last();
    }

    /// Records a malformed response followed by a corrective note, and
    /// charges the budget unless this is the first malformed response of the
    /// run.
    pub fn record_malformed(&mut self, message: String, reason: &str) {
        self.malformed_streak += 1;
        if !message.trim().is_empty() {
            self.conversation.push_assistant(message, vec![]);
            self.notify_last();
        }
        // The corrective note is between the agent and the model, it's not
        // reported to the host.
        self.conversation.push_user(format!(
            "Your last response could not be used: {reason}. Reply with \
             either a call to one of the available tools or your final \
             answer."
        ));
        // One corrective retry per run is free, however the malformed
        // responses are spread out.
        if self.free_retry_used {
            self.budget.consume();
        } else {
            self.free_retry_used = true;
        }
    }

    fn notify_last(&self) {
        let (Some(on_transcript), Some(item)) =
            (&self.on_transcript, self.conversation.items.last())
        else {
            return;
        };
        on_transcript(item.transcript(), item.source());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget() {
        let mut budget = StepBudget::new(2);
        assert_eq!(budget.remaining(), 2);
        budget.consume();
        budget.consume();
        assert!(budget.is_exhausted());
        budget.consume();
        assert_eq!(budget.used(), 2);
        assert_eq!(budget.remaining(), 0);
        assert!(StepBudget::new(0).is_exhausted());
    }

    #[test]
    fn test_malformed_charges_after_first() {
        let mut state =
            RunState::new("task".to_owned(), None, StepBudget::new(5), None);
        state.record_malformed(String::new(), "empty response");
        assert_eq!(state.budget.used(), 0);
        state.record_malformed("hmm".to_owned(), "empty response");
        assert_eq!(state.budget.used(), 1);
        assert_eq!(state.malformed_streak, 2);

        state.record_tool_calls(String::new(), vec![]);
        assert_eq!(state.malformed_streak, 0);
        // task, note, "hmm", note, tool calls
        assert_eq!(state.conversation.len(), 5);

        // A new streak doesn't get another free retry.
        state.record_malformed(String::new(), "empty response");
        assert_eq!(state.malformed_streak, 1);
        assert_eq!(state.budget.used(), 2);
    }
}
