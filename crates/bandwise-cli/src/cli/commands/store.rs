use bandwise_core::{FeedbackStore, SqliteStore};

use super::report;
use crate::cli::args::{DeleteArgs, ShowArgs};
use crate::exit_codes::{CONFIG_ERROR, SUCCESS};

pub fn cmd_show(args: ShowArgs) -> anyhow::Result<i32> {
    let store = SqliteStore::open(&args.store)?;
    match store.get(&args.id)? {
        Some(feedback) => {
            println!("{}", report::render(&feedback, args.format)?);
            Ok(SUCCESS)
        }
        None => {
            eprintln!("no report with id {} in {}", args.id, args.store.display());
            Ok(CONFIG_ERROR)
        }
    }
}

pub fn cmd_delete(args: DeleteArgs) -> anyhow::Result<i32> {
    let store = SqliteStore::open(&args.store)?;
    if store.delete(&args.id)? {
        eprintln!("Deleted report {}", args.id);
        Ok(SUCCESS)
    } else {
        eprintln!("no report with id {} in {}", args.id, args.store.display());
        Ok(CONFIG_ERROR)
    }
}
