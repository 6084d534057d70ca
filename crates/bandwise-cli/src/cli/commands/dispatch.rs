use super::super::args::*;
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Evaluate(args) => super::evaluate::run(args).await,
        Command::Show(args) => super::store::cmd_show(args),
        Command::Delete(args) => super::store::cmd_delete(args),
        Command::Chat(args) => super::chat::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
