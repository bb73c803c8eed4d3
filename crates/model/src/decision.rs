use crate::ToolCallRequest;

/// What the model wants the agent to do next, derived from one complete
/// response.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Run the tools, in order, and report back.
    ToolCalls {
        /// Text the model produced alongside the calls, possibly empty.
        message: String,
        /// The requested calls, never empty.
        calls: Vec<ToolCallRequest>,
    },
    /// The run is over and this is the answer.
    FinalAnswer(String),
    /// The response was neither a usable tool call nor an answer.
    Malformed {
        /// Whatever text the model produced.
        message: String,
        /// Why the response was rejected.
        reason: String,
    },
}

impl Decision {
    /// Returns the text the model produced with this decision.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Decision::ToolCalls { message, .. } => message,
            Decision::FinalAnswer(answer) => answer,
            Decision::Malformed { message, .. } => message,
        }
    }
}
