use std::future::ready;

use research_agent_core::tool::{ParamType, Parameter, Tool, ToolResult};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct GreetToolParameters {
    name: String,
}

/// A tool for greeting a person by name.
pub struct GreetTool {
    parameters: Vec<Parameter>,
}

impl GreetTool {
    /// Creates a new greet tool.
    #[inline]
    pub fn new() -> Self {
        GreetTool {
            parameters: vec![Parameter::required(
                "name",
                ParamType::String,
                "The name of the person to greet.",
            )],
        }
    }
}

impl Default for GreetTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GreetTool {
    type Input = GreetToolParameters;

    fn name(&self) -> &str {
        "greet"
    }

    fn description(&self) -> &str {
        "Greets a person by name."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn execute(
        &self,
        input: GreetToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(format!("Hello, {}! Nice to meet you!", input.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_greet() {
        let result = GreetTool::new()
            .execute(GreetToolParameters {
                name: "Nick".to_owned(),
            })
            .await;
        assert_eq!(result.unwrap(), "Hello, Nick! Nice to meet you!");
    }
}
