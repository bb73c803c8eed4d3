use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use research_agent_model::{
    AssistantMessage, ErrorKind, ModelFinishReason, ModelMessage,
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, ModelTool, ToolCallRequest, ToolCallResult,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Calls the first offered tool with the task as `text`, then repeats the
/// tool's observation back word by word.
#[derive(Debug)]
struct FakeModelResponse {
    fake_events: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(fake_events: VecDeque<ModelResponseEvent>) -> Self {
        Self {
            fake_events,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fake_events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(last) = req.messages.last() else {
                break 'blk Err(FakeModelProviderError(ErrorKind::Other));
            };

            let events = match (last, req.tools.first()) {
                (ModelMessage::User(text), Some(tool)) => VecDeque::from([
                    ModelResponseEvent::ToolCall(ToolCallRequest {
                        id: "call:0".to_owned(),
                        name: tool.name.clone(),
                        arguments: json!({ "text": text }),
                    }),
                    ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
                ]),
                (ModelMessage::Tool(result), _) => {
                    let mut events: VecDeque<_> = result
                        .content
                        .split_inclusive(' ')
                        .map(|word| {
                            ModelResponseEvent::MessageDelta(word.to_owned())
                        })
                        .collect();
                    events.push_back(ModelResponseEvent::Completed(
                        ModelFinishReason::Stop,
                    ));
                    events
                }
                _ => {
                    break 'blk Err(FakeModelProviderError(
                        ErrorKind::Moderated,
                    ));
                }
            };

            Ok(FakeModelResponse::new(events))
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    async fn collect(
        mut resp: FakeModelResponse,
    ) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
        let mut message = String::new();
        let mut tool_calls = vec![];
        let mut finish_reason = None;
        loop {
            let resp_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match resp_fut.await {
                Ok(Some(event)) => match event {
                    ModelResponseEvent::MessageDelta(delta) => {
                        message.push_str(&delta);
                    }
                    ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
                    ModelResponseEvent::Completed(reason) => {
                        finish_reason = Some(reason);
                    }
                },
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }
        (message, tool_calls, finish_reason)
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let provider = FakeModelProvider;
        let mut req = ModelRequest {
            messages: vec![ModelMessage::User("Good morning".to_string())],
            tools: vec![ModelTool {
                name: "echo".to_owned(),
                description: "Echoes the text".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
            remaining_steps: Some(3),
        };

        let resp = provider.send_request(&req).await.unwrap();
        let (message, tool_calls, finish_reason) = collect(resp).await;
        assert!(message.is_empty());
        assert_eq!(finish_reason, Some(ModelFinishReason::ToolCalls));
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].arguments, json!({ "text": "Good morning" }));

        req.messages.push(ModelMessage::Assistant(AssistantMessage {
            content: message,
            tool_calls: tool_calls.clone(),
        }));
        req.messages.push(ModelMessage::Tool(ToolCallResult {
            id: tool_calls[0].id.clone(),
            content: "You said Good morning".to_owned(),
        }));

        let resp = provider.send_request(&req).await.unwrap();
        let (message, tool_calls, finish_reason) = collect(resp).await;
        assert_eq!(message, "You said Good morning");
        assert!(tool_calls.is_empty());
        assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeModelProvider;
        let req = ModelRequest {
            messages: vec![],
            tools: vec![],
            remaining_steps: None,
        };
        let result = provider.send_request(&req).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
