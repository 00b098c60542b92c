//! Console command parsing.

use thiserror::Error;

use crate::domain::{CursorPosition, ParameterValue};

pub const HELP: &str = "\
Commands:
  set <group> <name> <value>   update a parameter (numbers or text)
  view [path]                  publish what you are looking at (empty = idle)
  cursor <x> <y>               publish your cursor position
  who                          list collaborators
  params                       list parameter groups
  help                         show this help
  quit                         leave the universe and exit
";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    SetParameter {
        group: String,
        name: String,
        value: ParameterValue,
    },
    View(String),
    Cursor(CursorPosition),
    Who,
    Params,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();

        let command = match verb {
            "set" => {
                if args.len() < 3 {
                    return Err(CommandError::Usage("set <group> <name> <value>"));
                }
                ConsoleCommand::SetParameter {
                    group: args[0].to_string(),
                    name: args[1].to_string(),
                    value: ParameterValue::parse(&args[2..].join(" ")),
                }
            }
            "view" => ConsoleCommand::View(args.join(" ")),
            "cursor" => match args.as_slice() {
                [x, y] => match (x.parse::<f64>(), y.parse::<f64>()) {
                    (Ok(x), Ok(y)) => ConsoleCommand::Cursor(CursorPosition { x, y }),
                    _ => return Err(CommandError::Usage("cursor <x> <y>")),
                },
                _ => return Err(CommandError::Usage("cursor <x> <y>")),
            },
            "who" => ConsoleCommand::Who,
            "params" => ConsoleCommand::Params,
            "help" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}
