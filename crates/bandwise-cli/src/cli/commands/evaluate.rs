use bandwise_core::{FeedbackStore, Pipeline, SqliteStore};

use super::backend;
use super::report;
use crate::cli::args::EvaluateArgs;
use crate::exit_codes::{self, SUCCESS};

pub async fn run(args: EvaluateArgs) -> anyhow::Result<i32> {
    let test = backend::load_test(&args.test)?;
    let essay1 = backend::read_essay(args.task1.as_deref())?;
    let essay2 = backend::read_essay(args.task2.as_deref())?;

    let (cfg, client) = backend::connect(&args.backend)?;
    let language = args.language.clone().unwrap_or_else(|| cfg.language.clone());
    let pipeline = Pipeline::from_config(client, &cfg)?;

    // Open the store before grading so a bad path fails without spending calls.
    let store = args.store.as_deref().map(SqliteStore::open).transpose()?;

    let progress = |status: &str| eprintln!("{}", status);
    let result = pipeline
        .evaluate(
            &test,
            essay1.as_deref(),
            essay2.as_deref(),
            args.target_band,
            &language,
            &progress,
        )
        .await;

    let feedback = match result {
        Ok(feedback) => feedback,
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind.as_str(), e);
            eprintln!("{}", e.user_message());
            return Ok(exit_codes::for_kind(e.kind));
        }
    };

    if let Some(store) = &store {
        store.put(&feedback.id().to_string(), &feedback)?;
        eprintln!("Saved report {}", feedback.id());
    }

    println!("{}", report::render(&feedback, args.format)?);
    Ok(SUCCESS)
}
