use std::collections::HashMap;
use std::sync::Arc;

use research_agent_model::{ModelTool, ToolCallRequest};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::tool::{AnyTool, Error, Tool, ToolObject, ToolResult, ToolSpec};

/// An error raised while registering tools.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another tool already uses this name.
    #[error("a tool named `{0}` is already registered")]
    DuplicateTool(String),
    /// The tool name is empty or whitespace.
    #[error("tool names must not be blank")]
    InvalidToolName,
}

struct RegisteredTool {
    spec: ToolSpec,
    object: Arc<dyn ToolObject>,
}

/// The fixed vocabulary of tools the model may invoke.
///
/// Tools are registered once, while the agent is being built, and the
/// registry is read-only afterwards. Definitions are exported in the order
/// the tools were registered.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_object(Arc::new(AnyTool(tool)))
    }

    pub(crate) fn register_object(
        &mut self,
        object: Arc<dyn ToolObject>,
    ) -> Result<(), RegistryError> {
        let spec = object.spec();
        if spec.name().trim().is_empty() {
            return Err(RegistryError::InvalidToolName);
        }
        if self.index.contains_key(spec.name()) {
            return Err(RegistryError::DuplicateTool(spec.name().to_owned()));
        }

        debug!("registered tool: {}", spec.name());
        self.index.insert(spec.name().to_owned(), self.tools.len());
        self.tools.push(RegisteredTool { spec, object });
        Ok(())
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the spec of the tool named `name`.
    #[inline]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.get(name).map(|tool| &tool.spec)
    }

    /// Returns the names of all tools, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.spec.name())
    }

    /// Exports the definitions of all tools, in registration order.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| tool.spec.definition()).collect()
    }

    #[inline]
    fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    /// Looks up the tool requested by `call` and validates its arguments.
    ///
    /// On success, the arguments are coerced to the declared types.
    pub fn resolve(&self, call: &ToolCallRequest) -> Result<ResolvedCall<'_>, Error> {
        let Some(tool) = self.get(&call.name) else {
            let available = self.names().collect::<Vec<_>>().join(", ");
            return Err(Error::unknown_tool().with_reason(format!(
                "no tool named `{}` (available tools: {available})",
                call.name
            )));
        };
        let spec = &tool.spec;

        let empty = Map::new();
        let arguments = match &call.arguments {
            Value::Object(arguments) => arguments,
            Value::Null => &empty,
            other => {
                return Err(Error::invalid_arguments().with_reason(format!(
                    "arguments must be a JSON object, got `{other}`"
                )));
            }
        };

        let unknown: Vec<_> = arguments
            .keys()
            .filter(|name| spec.parameter(name).is_none())
            .map(|name| format!("`{name}`"))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::invalid_arguments().with_reason(format!(
                "unrecognized argument(s) for `{}`: {}",
                spec.name(),
                unknown.join(", ")
            )));
        }

        let mut coerced = Map::with_capacity(arguments.len());
        let mut missing = vec![];
        for param in spec.parameters() {
            let value = match arguments.get(param.name()) {
                None | Some(Value::Null) => {
                    if param.is_required() {
                        missing.push(format!("`{}`", param.name()));
                    }
                    continue;
                }
                Some(value) => value,
            };
            let Some(value) = param.ty().coerce(value) else {
                return Err(Error::type_mismatch().with_reason(format!(
                    "argument `{}` expects a {}, got `{value}`",
                    param.name(),
                    param.ty()
                )));
            };
            coerced.insert(param.name().to_owned(), value);
        }
        if !missing.is_empty() {
            return Err(Error::invalid_arguments().with_reason(format!(
                "missing required argument(s) for `{}`: {}",
                spec.name(),
                missing.join(", ")
            )));
        }

        Ok(ResolvedCall {
            spec,
            arguments: coerced,
            object: Arc::clone(&tool.object),
        })
    }

    /// Resolves and runs the tool requested by `call`.
    ///
    /// This never fails: any error, including a panic inside the tool, is
    /// turned into an observation describing the failure.
    pub async fn invoke(&self, call: &ToolCallRequest) -> Observation {
        let span = debug_span!("tool invoke", tool = %call.name, id = %call.id);
        async {
            trace!("arguments: {}", call.arguments);
            let result = match self.resolve(call) {
                Ok(resolved) => resolved.execute().await,
                Err(err) => {
                    warn!("rejected tool call: {err}");
                    Err(err)
                }
            };
            let observation = Observation::from(result);
            trace!("observation: {observation:?}");
            observation
        }
        .instrument(span)
        .await
    }
}

/// A validated tool call, ready to run.
pub struct ResolvedCall<'r> {
    spec: &'r ToolSpec,
    arguments: Map<String, Value>,
    object: Arc<dyn ToolObject>,
}

impl ResolvedCall<'_> {
    /// Returns the spec of the resolved tool.
    #[inline]
    pub fn spec(&self) -> &ToolSpec {
        self.spec
    }

    /// Returns the coerced arguments.
    #[inline]
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    /// Runs the tool on its own task and waits for it.
    ///
    /// The task keeps running if the returned future is dropped, so a tool
    /// never stops halfway through its side effects.
    pub async fn execute(self) -> ToolResult {
        let fut = self.object.execute(Value::Object(self.arguments));
        match tokio::spawn(fut).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                error!("tool `{}` panicked", self.spec.name());
                Err(Error::execution_error().with_reason("the tool panicked"))
            }
            Err(_) => Err(Error::execution_error()
                .with_reason("the tool was cancelled")),
        }
    }
}

/// The text fed back to the model after a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Observation {
    content: String,
    is_error: bool,
}

impl Observation {
    /// Returns the observation text.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns `true` if the observation describes a failure.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// Converts the observation into its text.
    #[inline]
    pub fn into_content(self) -> String {
        self.content
    }
}

impl From<ToolResult> for Observation {
    fn from(result: ToolResult) -> Self {
        match result {
            Ok(content) => Self {
                content,
                is_error: false,
            },
            Err(err) => Self {
                content: format!("Error: {err}"),
                is_error: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::{ErrorKind, ParamType, Parameter};

    #[derive(Deserialize)]
    struct AddInput {
        a: f64,
        b: f64,
    }

    struct AddTool {
        parameters: Vec<Parameter>,
    }

    impl AddTool {
        fn new() -> Self {
            Self {
                parameters: vec![
                    Parameter::required("a", ParamType::Number, "The first number."),
                    Parameter::required("b", ParamType::Number, "The second number."),
                ],
            }
        }
    }

    impl Tool for AddTool {
        type Input = AddInput;

        fn name(&self) -> &str {
            "add_numbers"
        }

        fn description(&self) -> &str {
            "Adds two numbers together."
        }

        fn parameters(&self) -> &[Parameter] {
            &self.parameters
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(format!("{}", input.a + input.b)))
        }
    }

    struct PanickingTool;

    impl Tool for PanickingTool {
        type Input = Value;

        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "Always panics."
        }

        fn parameters(&self) -> &[Parameter] {
            &[]
        }

        #[allow(clippy::manual_async_fn)]
        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move {
                if input.is_object() {
                    panic!("boom");
                }
                Ok(input.to_string())
            }
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call:1".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(AddTool::new()).unwrap();
        registry.register(PanickingTool).unwrap();
        registry
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = registry();
        assert_eq!(
            registry.register(AddTool::new()),
            Err(RegistryError::DuplicateTool("add_numbers".to_owned()))
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["add_numbers", "explode"]
        );
    }

    #[test]
    fn test_resolve() {
        let registry = registry();

        let resolved = registry
            .resolve(&call("add_numbers", json!({ "a": 42, "b": "58" })))
            .unwrap();
        assert_eq!(resolved.spec().name(), "add_numbers");
        assert_eq!(resolved.arguments().get("b"), Some(&json!(58.0)));

        let err = registry.resolve(&call("greet", json!({}))).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
        assert!(err.reason().contains("add_numbers, explode"));

        let err = registry
            .resolve(&call("add_numbers", json!({ "a": 1 })))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert!(err.reason().contains("`b`"));

        let err = registry
            .resolve(&call("add_numbers", json!({ "a": 1, "b": 2, "c": 3 })))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert!(err.reason().contains("`c`"));

        let err = registry
            .resolve(&call("add_numbers", json!({ "a": "one", "b": 2 })))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = registry
            .resolve(&call("add_numbers", json!([1, 2])))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn test_invoke() {
        let registry = registry();

        let observation = registry
            .invoke(&call("add_numbers", json!({ "a": 42, "b": 58 })))
            .await;
        assert!(!observation.is_error());
        assert_eq!(observation.content(), "100");

        let observation = registry.invoke(&call("greet", json!({}))).await;
        assert!(observation.is_error());
        assert!(observation.content().starts_with("Error: Unknown tool"));

        let observation = registry.invoke(&call("explode", Value::Null)).await;
        assert!(observation.is_error());
        assert!(observation.content().contains("panicked"));
    }

    #[test]
    fn test_definitions() {
        let definitions = registry().definitions();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].name, "add_numbers");
        assert_eq!(definitions[0].parameters["required"], json!(["a", "b"]));
        assert_eq!(
            definitions[0].parameters["properties"]["a"]["type"],
            json!("number")
        );
    }
}
