use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bandwise",
    version,
    about = "Two-pass LLM grading for academic writing tests"
)]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Grade one or both essays of a writing test
    Evaluate(EvaluateArgs),
    /// Print a stored report
    Show(ShowArgs),
    /// Remove a stored report
    Delete(DeleteArgs),
    /// One preparation-chat turn with the tutor
    Chat(ChatArgs),
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Backend selection shared by commands that call the model.
#[derive(clap::Args, Clone, Debug)]
pub struct BackendArgs {
    /// Evaluator config (YAML); BANDWISE_* variables are applied on top
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Backend API key
    #[arg(long, env = "BANDWISE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct EvaluateArgs {
    /// Writing test definition (YAML with task1/task2 prompts)
    #[arg(long)]
    pub test: PathBuf,

    /// Task 1 essay (plain text)
    #[arg(long)]
    pub task1: Option<PathBuf>,

    /// Task 2 essay (plain text)
    #[arg(long)]
    pub task2: Option<PathBuf>,

    /// Band the candidate is aiming for (0-9, half-band steps)
    #[arg(long, value_parser = parse_band)]
    pub target_band: f64,

    /// Feedback language; defaults to the config value
    #[arg(long)]
    pub language: Option<String>,

    /// SQLite file to persist the report in
    #[arg(long)]
    pub store: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ShowArgs {
    #[arg(long)]
    pub store: PathBuf,

    /// Report id
    pub id: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Clone, Debug)]
pub struct DeleteArgs {
    #[arg(long)]
    pub store: PathBuf,

    /// Report id
    pub id: String,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ChatArgs {
    /// Learner message
    pub message: String,

    /// Writing test to anchor the conversation on
    #[arg(long, requires = "task")]
    pub test: Option<PathBuf>,

    /// Which task of --test the learner is preparing (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub task: Option<u8>,

    #[arg(long)]
    pub language: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

fn parse_band(raw: &str) -> Result<f64, String> {
    let band: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if !(0.0..=9.0).contains(&band) {
        return Err(format!("band {} is outside 0-9", band));
    }
    if (band * 2.0).fract() != 0.0 {
        return Err(format!("band {} is not a multiple of 0.5", band));
    }
    Ok(band)
}
