//! A set of built-in tools that models can use.

mod add_numbers;
mod calculate;
mod greet;
mod notes;

pub use add_numbers::AddNumbersTool;
pub use calculate::CalculateTool;
pub use greet::GreetTool;
pub use notes::{GetNotesTool, SaveNoteTool};
