//! Tool call supports.

mod error;
mod param;
mod registry;

use std::pin::Pin;

use research_agent_model::ModelTool;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use param::{ParamType, Parameter};
pub use registry::{Observation, RegistryError, ResolvedCall, ToolRegistry};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// The parameters are declared data: the registry validates and coerces the
/// model's arguments against [`Tool::parameters`] before deserializing them
/// into [`Tool::Input`], so the two must agree.
///
/// The tool can be context-aware, meaning it can access additional state
/// such as a note store shared within a session. To do this, make the
/// context a handle owned by the tool, set during initialization, and clone
/// it into the future when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the declared parameters of the tool, in the order they
    /// should be presented to the model.
    fn parameters(&self) -> &[Parameter];

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    /// Once started, the future always runs to completion, even if the run
    /// that requested it is aborted.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// The declared shape of a registered tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolSpec {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
}

impl ToolSpec {
    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the tool.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared parameters.
    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the parameter named `name`.
    #[inline]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.name() == name)
    }

    /// Exports the spec in the form model providers expect.
    pub fn definition(&self) -> ModelTool {
        ModelTool {
            name: self.name.clone(),
            description: self.description.trim().to_owned(),
            parameters: param::object_schema(&self.parameters),
        }
    }
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn spec(&self) -> ToolSpec;

    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameters().to_vec(),
        }
    }

    #[inline]
    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_arguments().with_reason(reason),
                )));
            }
        };
        Box::pin(self.0.execute(input))
    }
}
