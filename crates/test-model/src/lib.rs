//! A local scripted model, for tests and offline replays.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use research_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            let preset_events = &this.preset.events;
            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    this.preset.effective_finish_reason(),
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct ScriptState {
    next_step: usize,
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local scripted model.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to each request. Requests consume the steps in the
/// order they were added, and a step configured with failures is retried
/// until its failures are used up. If there are no enough steps in the
/// script, an error will be returned, unless the provider was told to
/// repeat its last step.
///
/// Clones share the script cursor and the recorded requests.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing and replays.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    repeat_last: bool,
    delay: Option<Duration>,
    state: Arc<Mutex<ScriptState>>,
}

impl TestModelProvider {
    /// Creates a provider that replays `script`.
    #[inline]
    pub fn from_script(script: Vec<PresetResponse>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Keeps answering with the last step once the script runs out.
    #[inline]
    pub fn repeat_last_step(&mut self, repeat: bool) {
        self.repeat_last = repeat;
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock_state().requests.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        let mut state = self.lock_state();
        state.requests.push(req.clone());

        let step_idx = if self.repeat_last {
            state.next_step.min(self.script.len().saturating_sub(1))
        } else {
            state.next_step
        };
        let Some(preset) = self.script.get(step_idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        if let Some(failures) = preset.failures {
            if failures == 0 || state.failed_attempts < failures {
                state.failed_attempts += 1;
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
        }

        state.failed_attempts = 0;
        state.next_step += 1;
        Ok(preset.clone())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let resp = self.next_response(req).map(|preset| TestModelResponse {
            preset,
            event_idx: 0,
            delay,
            sleep: None,
        });
        ready(resp)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use research_agent_model::{
        ModelFinishReason, ModelMessage, ModelRequest, ModelTool,
        ToolCallRequest,
    };
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, ModelFinishReason) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(reason) => {
                    return (msg, tool_call, reason);
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
    }

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            tools: vec![ModelTool {
                name: "get_notes".to_owned(),
                description: "Retrieves notes".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "topic": {
                            "type": "string",
                            "description": "Topic to filter by"
                        }
                    }
                }),
            }],
            remaining_steps: Some(10),
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a ".to_owned()),
            PresetEvent::MessageDelta("look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "get_notes".to_owned(),
                arguments: json!({ "topic": "pricing" }),
            }),
        ]));
        provider.add_assistant_response_step(PresetResponse::text("All done."));

        let resp = provider.send_request(&request("Hi")).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me take a look.");
        assert_eq!(reason, ModelFinishReason::ToolCalls);
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "get_notes");
        assert_eq!(tool_call.arguments, json!({ "topic": "pricing" }));

        let resp = provider.send_request(&request("And?")).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "All done.");
        assert!(tool_call.is_none());
        assert_eq!(reason, ModelFinishReason::Stop);

        let err = provider.send_request(&request("More?")).await.err();
        assert_eq!(err.map(|err| err.kind()), Some(ErrorKind::Other));

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[1].messages,
            vec![ModelMessage::User("And?".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_failures_then_success() {
        let provider = TestModelProvider::from_script(vec![
            PresetResponse::text("finally").with_failures(2),
        ]);

        for _ in 0..2 {
            let err = provider.send_request(&request("Hi")).await.err();
            assert_eq!(
                err.map(|err| err.kind()),
                Some(ErrorKind::RateLimitExceeded)
            );
        }
        let resp = provider.send_request(&request("Hi")).await.unwrap();
        let (msg, _, _) = collect_response(resp).await;
        assert_eq!(msg, "finally");
    }

    #[tokio::test]
    async fn test_repeat_last_step() {
        let mut provider = TestModelProvider::from_script(vec![
            PresetResponse::tool_call("call", "get_notes", json!({})),
        ]);
        provider.repeat_last_step(true);

        for _ in 0..5 {
            let resp = provider.send_request(&request("Hi")).await.unwrap();
            let (_, tool_call, _) = collect_response(resp).await;
            assert_eq!(tool_call.unwrap().name, "get_notes");
        }
    }
}
