//! Conversation-related types.

use research_agent_model::{
    AssistantMessage, ModelMessage, ToolCallRequest, ToolCallResult,
};

/// Who produced a transcript line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// The task, the system prompt, or a note added by the agent.
    User,
    /// The model.
    Assistant,
    /// A tool observation.
    Tool,
}

/// Represents a conversation.
///
/// A conversation belongs to exactly one run and is only appended to by the
/// agent loop driving that run.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Returns the items in order.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }

    pub(crate) fn push_system(&mut self, prompt: String) {
        self.items.push(Item {
            msg: ModelMessage::System(prompt.clone()),
            transcript: prompt,
            source: TranscriptSource::User,
        });
    }

    pub(crate) fn push_user(&mut self, text: String) {
        self.items.push(Item {
            msg: ModelMessage::User(text.clone()),
            transcript: text,
            source: TranscriptSource::User,
        });
    }

    pub(crate) fn push_assistant(
        &mut self,
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    ) {
        let mut transcript = content.clone();
        for call in &tool_calls {
            if !transcript.is_empty() {
                transcript.push('\n');
            }
            transcript.push_str(&format!("-> {}({})", call.name, call.arguments));
        }
        self.items.push(Item {
            msg: ModelMessage::Assistant(AssistantMessage {
                content,
                tool_calls,
            }),
            transcript,
            source: TranscriptSource::Assistant,
        });
    }

    pub(crate) fn push_tool_result(&mut self, id: String, content: String) {
        self.items.push(Item {
            msg: ModelMessage::Tool(ToolCallResult {
                id,
                content: content.clone(),
            }),
            transcript: content,
            source: TranscriptSource::Tool,
        });
    }

    /// Returns the most recent non-blank text produced by the model.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.items.iter().rev().find_map(|item| match &item.msg {
            ModelMessage::Assistant(msg) if !msg.content.trim().is_empty() => {
                Some(msg.content.as_str())
            }
            _ => None,
        })
    }
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
    pub(crate) transcript: String,
    pub(crate) source: TranscriptSource,
}

impl Item {
    /// Returns the message sent to the model for this item.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }

    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns who produced this item.
    #[inline]
    pub fn source(&self) -> TranscriptSource {
        self.source
    }
}
