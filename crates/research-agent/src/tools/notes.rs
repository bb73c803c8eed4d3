use std::fmt::Write as _;
use std::future::ready;

use research_agent_core::tool::{ParamType, Parameter, Tool, ToolResult};
use serde::Deserialize;

use crate::notes::Notebook;

#[derive(Deserialize)]
pub struct SaveNoteToolParameters {
    topic: String,
    content: String,
}

/// A tool for saving a finding into the session's notebook.
pub struct SaveNoteTool {
    notebook: Notebook,
    parameters: Vec<Parameter>,
}

impl SaveNoteTool {
    /// Creates a new save note tool writing into `notebook`.
    #[inline]
    pub fn new(notebook: Notebook) -> Self {
        SaveNoteTool {
            notebook,
            parameters: vec![
                Parameter::required(
                    "topic",
                    ParamType::String,
                    "The topic or category for this note (e.g., \"price \
                     comparison\", \"key features\").",
                ),
                Parameter::required(
                    "content",
                    ParamType::String,
                    "The actual content or finding to save.",
                ),
            ],
        }
    }
}

impl Tool for SaveNoteTool {
    type Input = SaveNoteToolParameters;

    fn name(&self) -> &str {
        "save_note"
    }

    fn description(&self) -> &str {
        r#"
Saves a research note for later reference.
Use this to store important findings, so they can be looked up later with `get_notes`."#
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn execute(
        &self,
        input: SaveNoteToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let note = self.notebook.save(input.topic, input.content);
        ready(Ok(format!(
            "Note #{} saved under topic '{}'",
            note.id(),
            note.topic()
        )))
    }
}

#[derive(Deserialize)]
pub struct GetNotesToolParameters {
    #[serde(default)]
    topic: String,
}

/// A tool for reading notes back from the session's notebook.
pub struct GetNotesTool {
    notebook: Notebook,
    parameters: Vec<Parameter>,
}

impl GetNotesTool {
    /// Creates a new get notes tool reading from `notebook`.
    #[inline]
    pub fn new(notebook: Notebook) -> Self {
        GetNotesTool {
            notebook,
            parameters: vec![Parameter::optional(
                "topic",
                ParamType::String,
                "Only return notes whose topic contains this text, ignoring \
                 case. Leave empty to get all notes.",
            )],
        }
    }
}

impl Tool for GetNotesTool {
    type Input = GetNotesToolParameters;

    fn name(&self) -> &str {
        "get_notes"
    }

    fn description(&self) -> &str {
        "Retrieves previously saved research notes, optionally filtered by topic."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn execute(
        &self,
        input: GetNotesToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(self.render(&input.topic)))
    }
}

impl GetNotesTool {
    fn render(&self, topic: &str) -> String {
        if self.notebook.is_empty() {
            return "No notes saved yet.".to_owned();
        }

        let notes = self.notebook.list(topic);
        if notes.is_empty() {
            return format!("No notes found for topic '{topic}'");
        }

        let mut result = format!("Found {} note(s):", notes.len());
        for note in notes {
            write!(
                result,
                "\n\n[{}] {}: {}",
                note.id(),
                note.topic(),
                note.content()
            )
            .ok();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_notes(topic: &str) -> GetNotesToolParameters {
        GetNotesToolParameters {
            topic: topic.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let notebook = Notebook::new();
        let save_note = SaveNoteTool::new(notebook.clone());
        let get_notes_tool = GetNotesTool::new(notebook.clone());

        let result = get_notes_tool.execute(get_notes("")).await;
        assert_eq!(result.unwrap(), "No notes saved yet.");

        let result = save_note
            .execute(SaveNoteToolParameters {
                topic: "pricing".to_owned(),
                content: "X costs $10".to_owned(),
            })
            .await;
        assert_eq!(result.unwrap(), "Note #1 saved under topic 'pricing'");
        save_note
            .execute(SaveNoteToolParameters {
                topic: "Key features".to_owned(),
                content: "X is fast".to_owned(),
            })
            .await
            .unwrap();

        let result = get_notes_tool.execute(get_notes("pricing")).await;
        assert_eq!(result.unwrap(), "Found 1 note(s):\n\n[1] pricing: X costs $10");

        let result = get_notes_tool.execute(get_notes("")).await;
        assert_eq!(
            result.unwrap(),
            "Found 2 note(s):\n\n[1] pricing: X costs $10\n\n[2] Key \
             features: X is fast"
        );

        let result = get_notes_tool.execute(get_notes("unrelated")).await;
        assert_eq!(result.unwrap(), "No notes found for topic 'unrelated'");
        assert_eq!(notebook.len(), 2);
    }
}
