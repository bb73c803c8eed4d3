use research_agent_model::{ModelFinishReason, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
    /// Overrides the finish reason reported after the events. By default
    /// it's inferred from whether the events contain a tool call.
    #[serde(default)]
    pub finish_reason: Option<ModelFinishReason>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            finish_reason: None,
        }
    }

    /// Creates a `PresetResponse` that answers with plain text.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a `PresetResponse` that requests a single tool call.
    #[inline]
    pub fn tool_call<ID: Into<String>, N: Into<String>>(
        id: ID,
        name: N,
        arguments: Value,
    ) -> Self {
        Self::with_events([PresetEvent::ToolCall(ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        })])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Reports `reason` as the finish reason, whatever the events are.
    #[inline]
    pub fn with_finish_reason(mut self, reason: ModelFinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub(crate) fn effective_finish_reason(&self) -> ModelFinishReason {
        if let Some(reason) = self.finish_reason {
            return reason;
        }
        let has_tool_call = self
            .events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));
        if has_tool_call {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_script_entry() {
        let response: PresetResponse = serde_json::from_value(json!({
            "events": [
                { "type": "message_delta", "data": "Let me save that." },
                {
                    "type": "tool_call",
                    "data": {
                        "id": "call:1",
                        "name": "save_note",
                        "arguments": { "topic": "pricing", "content": "X costs $10" }
                    }
                }
            ]
        }))
        .unwrap();

        assert_eq!(response.failures, None);
        assert_eq!(
            response.effective_finish_reason(),
            ModelFinishReason::ToolCalls
        );
        assert_eq!(
            response.events[1],
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call:1".to_owned(),
                name: "save_note".to_owned(),
                arguments: json!({
                    "topic": "pricing",
                    "content": "X costs $10"
                }),
            })
        );
    }

    #[test]
    fn test_finish_reason_override() {
        let response = PresetResponse::text("")
            .with_finish_reason(ModelFinishReason::ToolCalls);
        assert_eq!(
            response.effective_finish_reason(),
            ModelFinishReason::ToolCalls
        );
        assert_eq!(
            PresetResponse::text("done").effective_finish_reason(),
            ModelFinishReason::Stop
        );
    }
}
