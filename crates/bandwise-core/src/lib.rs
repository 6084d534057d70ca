//! Two-pass LLM grading for long-form writing.
//!
//! Each submitted task goes through two dependent backend calls:
//!
//! - an editor pass that lists localized errors, without scores
//! - an examiner pass that scores four rubric criteria, using the editor's findings
//!   as evidence
//!
//! Calls run strictly one after another, separated by a fixed cooldown, and
//! rate-limit failures are waited out with exponential backoff. The criterion scores
//! are reduced to one overall band (0 to 9 in half-band steps, Task 2 weighted
//! double).
//!
//! # Quick Start
//!
//! ```no_run
//! use bandwise_core::{build_client, Credentials, EvaluatorConfig, Pipeline, Silent, WritingTest};
//!
//! # async fn example(test: WritingTest, essay: &str) -> anyhow::Result<()> {
//! let cfg = EvaluatorConfig::from_env()?;
//! let client = build_client(&cfg, Credentials::new("api-key"))?;
//! let pipeline = Pipeline::from_config(client, &cfg)?;
//!
//! let feedback = pipeline
//!     .evaluate(&test, None, Some(essay), 7.0, &cfg.language, &Silent)
//!     .await?;
//! println!("overall band {:.1}", feedback.overall_score());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `BANDWISE_PROVIDER` | `gemini` (default) or `openai` |
//! | `BANDWISE_MODEL` | Model name (default: `gemini-2.0-flash`) |
//! | `BANDWISE_BASE_URL` | Backend endpoint override |
//! | `BANDWISE_COOLDOWN_MS` | Pause between dependent calls (default: 5000) |
//! | `BANDWISE_MAX_RETRIES` | Retries on rate limiting (default: 3) |
//! | `BANDWISE_LANGUAGE` | Feedback language (default: English) |

pub mod aggregate;
pub mod chat;
pub mod config;
pub mod cooldown;
pub mod editor;
pub mod errors;
pub mod examiner;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod retry;
pub mod rubric;
pub mod storage;

pub use aggregate::{aggregate, round_to_half_band, task_average};
pub use chat::{PrepTutor, TutorPayload, TutorReply};
pub use config::{Credentials, EvaluatorConfig, Provider};
pub use cooldown::CooldownScheduler;
pub use editor::EditorPass;
pub use errors::{ErrorKind, PipelineError, PipelineResult};
pub use examiner::ExaminerPass;
pub use model::{
    Criterion, CriterionScore, EssayFeedback, Finding, PerTask, TaskEvaluation, TaskNumber,
    WritingTask, WritingTest,
};
pub use pipeline::Pipeline;
pub use progress::{ChannelReporter, ProgressReporter, Silent};
pub use providers::llm::{build_client, ModelCaller, ModelRequest};
pub use retry::{RetryExecutor, RetryPolicy};
pub use rubric::Rubric;
pub use storage::{FeedbackStore, SqliteStore};
