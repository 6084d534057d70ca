use bandwise_core::{PrepTutor, RetryExecutor, TaskNumber};

use super::backend;
use crate::cli::args::ChatArgs;
use crate::exit_codes::{self, SUCCESS};

pub async fn run(args: ChatArgs) -> anyhow::Result<i32> {
    let (cfg, client) = backend::connect(&args.backend)?;
    let language = args.language.clone().unwrap_or_else(|| cfg.language.clone());
    let mut tutor = PrepTutor::new(client, RetryExecutor::new(cfg.retry), language);

    if let (Some(path), Some(n)) = (&args.test, args.task) {
        let test = backend::load_test(path)?;
        let task = TaskNumber::try_from(n).map_err(anyhow::Error::msg)?;
        tutor = tutor.with_task(test.task(task).clone());
    }

    let reply = match tutor.send(&args.message).await {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind.as_str(), e);
            eprintln!("{}", e.user_message());
            return Ok(exit_codes::for_kind(e.kind));
        }
    };

    println!("{}", reply.text);
    if let Some(payload) = reply.payload {
        if !payload.vocabulary.is_empty() {
            println!("\nVocabulary:");
            for item in &payload.vocabulary {
                if item.meaning.is_empty() {
                    println!("  - {}", item.word);
                } else {
                    println!("  - {}: {}", item.word, item.meaning);
                }
                if !item.example.is_empty() {
                    println!("      e.g. {}", item.example);
                }
            }
        }
        if !payload.suggestions.is_empty() {
            println!("\nSuggestions:");
            for s in &payload.suggestions {
                println!("  - {}", s);
            }
        }
    }
    Ok(SUCCESS)
}
