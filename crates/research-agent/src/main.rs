//! An interactive research assistant in the terminal.
//!
//! No network model provider is bundled, so the model's side of the
//! conversation is replayed from a JSON script (see `demos/`).

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use research_agent::SessionBuilder;
use research_agent::core::{RunError, RunOutcome, TranscriptSource};
use research_agent::notes::Notebook;
use research_agent_test_model::{PresetResponse, TestModelProvider};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const NOTE_PREVIEW_CHARS: usize = 50;

const EXAMPLE_TASKS: &[&str] = &[
    "Greet Nick and then calculate 42 + 58. Tell me both results.",
    "Save a note under 'pricing' that X costs $10, then read back your \
     pricing notes.",
    "Calculate the percentage difference between 26.1 and 11.4 and save it \
     as a note.",
    "Summarize every note saved so far in this session.",
];

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error(
        "RESEARCH_AGENT_REPLAY environment variable is not set, point it at \
         a model script such as demos/replay.json"
    )]
    MissingReplay,
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("failed to read {path:?}: {source}")]
    ReadScript {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    ParseScript {
        path: PathBuf,
        source: serde_json::Error,
    },
}

struct Config {
    replay: PathBuf,
    max_steps: u32,
    max_malformed: Option<u32>,
}

impl Config {
    fn from_env() -> Result<Self, ConfigError> {
        let replay = env::var_os("RESEARCH_AGENT_REPLAY")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingReplay)?;
        let max_steps = number_from_env("RESEARCH_AGENT_MAX_STEPS")?
            .unwrap_or(research_agent::core::DEFAULT_STEP_BUDGET);
        let max_malformed = number_from_env("RESEARCH_AGENT_MAX_MALFORMED")?;
        Ok(Self {
            replay,
            max_steps,
            max_malformed,
        })
    }

    fn load_script(&self) -> Result<Vec<PresetResponse>, ConfigError> {
        let path = &self.replay;
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::ReadScript {
                path: path.clone(),
                source,
            }
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::ParseScript {
            path: path.clone(),
            source,
        })
    }
}

fn number_from_env(var: &'static str) -> Result<Option<u32>, ConfigError> {
    let Ok(value) = env::var(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var, value })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let script = match config.load_script() {
        Ok(script) => script,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("loaded {} scripted model responses", script.len());
    let model_provider = TestModelProvider::from_script(script);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut session_builder =
        SessionBuilder::with_model_provider(model_provider)
            .with_system_prompt(include_str!("./system_prompt.md"))
            .with_step_budget(config.max_steps)
            .on_transcript(move |transcript, source| {
                event_tx.send((transcript.to_owned(), source)).ok();
            });
    if let Some(limit) = config.max_malformed {
        session_builder = session_builder.with_malformed_limit(limit);
    }
    let session = match session_builder.build() {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to set up the session: {err}");
            return ExitCode::FAILURE;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!("{}", "=".repeat(60));
    println!("🔬 Research Assistant Agent");
    println!("{}", "=".repeat(60));
    println!();
    println!("Example tasks you can try:");
    for (i, task) in EXAMPLE_TASKS.iter().enumerate() {
        println!("  {}. {}", i + 1, task);
    }
    println!();

    loop {
        println!("{}", "-".repeat(60));
        print!("🎯 Enter your research task (or 'quit' to exit): ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let input = line.trim();
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("👋 Goodbye!");
            break;
        }
        if input.is_empty() {
            continue;
        }

        let task = match example_task(input) {
            Some(task) => {
                println!("📋 Running example: {task}");
                task
            }
            None => input,
        };

        println!();
        println!("🚀 Starting research...");
        println!("{}", "=".repeat(60));

        let run = session.run(task);
        match drive_run(run, &mut event_rx, &progress_style).await {
            Ok(outcome) => {
                println!("{}", "=".repeat(60));
                println!("📊 FINAL RESULT:");
                println!("{}", "-".repeat(60));
                println!("{}", outcome.bright_white());
            }
            Err(err) => {
                println!("❌ Error: {}", err.bright_red());
            }
        }
        println!();

        print_notes(session.notebook());
    }

    ExitCode::SUCCESS
}

/// Waits for a run to end, printing transcripts as they arrive.
async fn drive_run(
    run: impl Future<Output = Result<RunOutcome, RunError>>,
    event_rx: &mut mpsc::UnboundedReceiver<(String, TranscriptSource)>,
    progress_style: &ProgressStyle,
) -> Result<RunOutcome, RunError> {
    let mut run = pin!(run);
    let mut progress_bar: Option<ProgressBar> = None;

    loop {
        // Create a new progress bar if it has been finished.
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🤔 Thinking...");
                progress_bar
            })
            .inc(1);

        let sleep = sleep(Duration::from_millis(100));
        select! {
            result = &mut run => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                while let Ok((transcript, source)) = event_rx.try_recv() {
                    print_transcript(&transcript, source);
                }
                return result;
            }
            Some((transcript, source)) = event_rx.recv() => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                print_transcript(&transcript, source);
            }
            _ = sleep => {}
        }
    }
}

fn print_transcript(transcript: &str, source: TranscriptSource) {
    match source {
        TranscriptSource::Assistant => {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                transcript.bright_white()
            );
        }
        TranscriptSource::Tool => {
            println!("{}🔧 {}", BAR_CHAR.bright_yellow(), transcript.dimmed());
        }
        // The user typed it, no need to echo.
        TranscriptSource::User => {}
    }
}

fn print_notes(notebook: &Notebook) {
    let notes = notebook.list("");
    if notes.is_empty() {
        return;
    }

    println!("📝 Notes saved this session:");
    for note in notes {
        let content = note.content();
        let preview = match content.char_indices().nth(NOTE_PREVIEW_CHARS) {
            Some((end, _)) => format!("{}...", &content[..end]),
            None => content.to_owned(),
        };
        println!("   [{}] {}: {}", note.id(), note.topic(), preview);
    }
}

fn example_task(input: &str) -> Option<&'static str> {
    let index = input.parse::<usize>().ok()?;
    EXAMPLE_TASKS.get(index.checked_sub(1)?).copied()
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
