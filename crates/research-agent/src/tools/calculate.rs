use std::future::ready;

use research_agent_core::tool::{
    Error as ToolError, ParamType, Parameter, Tool, ToolResult,
};
use serde::Deserialize;

use crate::expr::{EvalError, Evaluator};

#[derive(Deserialize)]
pub struct CalculateToolParameters {
    expression: String,
}

/// A tool for evaluating arithmetic expressions.
pub struct CalculateTool {
    evaluator: Evaluator,
    parameters: Vec<Parameter>,
}

impl CalculateTool {
    /// Creates a new calculate tool with the default evaluator limits.
    #[inline]
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::default())
    }

    /// Creates a new calculate tool using `evaluator`.
    pub fn with_evaluator(evaluator: Evaluator) -> Self {
        CalculateTool {
            evaluator,
            parameters: vec![Parameter::required(
                "expression",
                ParamType::String,
                "A mathematical expression to evaluate (e.g., \"100 * 1.1\" \
                 or \"50 / 7\").",
            )],
        }
    }
}

impl Default for CalculateTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculateTool {
    type Input = CalculateToolParameters;

    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        r#"
Evaluates a mathematical expression. Useful for calculations during research.
Only digits, spaces, `+ - * / ( )` and decimal points are allowed. `//` is floor division and `**` is exponentiation."#
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn execute(
        &self,
        input: CalculateToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let expression = input.expression;
        let result = match self.evaluator.evaluate(&expression) {
            Ok(value) => Ok(format!("{} = {value}", expression.trim())),
            Err(err @ EvalError::DisallowedCharacter { .. }) => {
                Err(ToolError::disallowed_character().with_reason(err.to_string()))
            }
            Err(err) => {
                Err(ToolError::evaluation().with_reason(err.to_string()))
            }
        };
        ready(result)
    }
}
