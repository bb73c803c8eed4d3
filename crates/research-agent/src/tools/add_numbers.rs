use std::future::ready;

use research_agent_core::tool::{
    Error as ToolError, ParamType, Parameter, Tool, ToolResult,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct AddNumbersToolParameters {
    a: f64,
    b: f64,
}

/// A tool for adding two numbers together.
pub struct AddNumbersTool {
    parameters: Vec<Parameter>,
}

impl AddNumbersTool {
    /// Creates a new add numbers tool.
    #[inline]
    pub fn new() -> Self {
        AddNumbersTool {
            parameters: vec![
                Parameter::required("a", ParamType::Number, "The first number."),
                Parameter::required(
                    "b",
                    ParamType::Number,
                    "The second number.",
                ),
            ],
        }
    }
}

impl Default for AddNumbersTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for AddNumbersTool {
    type Input = AddNumbersToolParameters;

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
        input: AddNumbersToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let sum = input.a + input.b;
        ready(if sum.is_finite() {
            Ok(format!("{sum}"))
        } else {
            Err(ToolError::evaluation().with_reason("the sum is not finite"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_numbers() {
        let tool = AddNumbersTool::new();

        let result = tool
            .execute(AddNumbersToolParameters { a: 42.0, b: 58.0 })
            .await;
        assert_eq!(result.unwrap(), "100");

        let result = tool
            .execute(AddNumbersToolParameters { a: 0.5, b: 0.25 })
            .await;
        assert_eq!(result.unwrap(), "0.75");

        let result = tool
            .execute(AddNumbersToolParameters {
                a: f64::MAX,
                b: f64::MAX,
            })
            .await;
        assert!(result.is_err());
    }
}
