//! Command handlers.

pub mod entities;
pub mod set;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        Command::Entities(args) => entities::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Set(args) => set::handle(args, global).await,
    }
}
