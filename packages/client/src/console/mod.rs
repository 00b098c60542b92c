//! Interactive console front-end for a live session.

mod command;
mod formatter;
mod runner;

pub use command::{CommandError, ConsoleCommand};
pub use formatter::SessionFormatter;
pub use runner::run_console;
