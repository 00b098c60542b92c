//! Console session: mounts a live session and drives it from stdin.

use std::{io::Write, sync::Arc};

use livesync_shared::time::{Clock, SystemClock};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig,
    connection::ConnectionManager,
    domain::{UniverseId, should_exit_immediately},
    dto::websocket::EventKind,
    error::ClientError,
    session::LiveSession,
};

use super::{
    command::{ConsoleCommand, HELP},
    formatter::SessionFormatter,
};

const PROMPT: &str = "universe> ";

/// Redisplay the prompt after printing asynchronous output
fn redisplay_prompt() {
    print!("{}", PROMPT);
    std::io::stdout().flush().ok();
}

fn print_async(text: &str) {
    if !text.is_empty() {
        print!("{}", text);
        redisplay_prompt();
    }
}

/// Run an interactive console session until the user quits or the session fails.
///
/// Returns an error when authentication is rejected or reconnection is exhausted.
pub async fn run_console(
    config: ClientConfig,
    universe_id: UniverseId,
    auth_token: String,
    current_view: String,
) -> Result<(), ClientError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Terminal errors end the console; the rest are shown and survived.
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<ClientError>();
    let mut connection = ConnectionManager::new(config);
    connection.on_error(move |error| {
        print_async(&format!("\n! {}\n", error));
        if should_exit_immediately(error) || matches!(error, ClientError::ReconnectExhausted(_)) {
            let _ = fatal_tx.send(error.clone());
        }
    });

    let session = LiveSession::mount_with(
        connection,
        universe_id,
        &auth_token,
        &current_view,
        clock.clone(),
    )?;

    for kind in EventKind::ALL {
        if kind == EventKind::Error {
            // already surfaced through the error callback
            continue;
        }
        session.on_event(kind, |event| {
            print_async(&SessionFormatter::format_event(event));
        });
    }

    let mut status_rx = session.subscribe_status();
    let status_task = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            print_async(&SessionFormatter::format_status(status));
        }
    });

    println!("\nJoining universe {}. Type 'help' for commands.\n", universe_id);

    // Spawn a blocking thread for rustyline (synchronous readline)
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                    }
                    if input_tx.send(line.to_string()).is_err() {
                        // Channel closed, exit thread
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    let outcome = loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break Ok(());
                };
                match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break Ok(()),
                    Ok(Some(command)) => execute(&session, command, clock.as_ref()),
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Some(error) = fatal_rx.recv() => {
                tracing::error!("Session ended: {}", error);
                break Err(error);
            }
        }
    };

    status_task.abort();
    session.unmount().await;
    outcome
}

fn execute(session: &LiveSession, command: ConsoleCommand, clock: &dyn Clock) {
    match command {
        ConsoleCommand::SetParameter { group, name, value } => {
            if !session.update_parameter(&group, &name, value) {
                println!("(offline: {}.{} updated locally only)", group, name);
            }
        }
        ConsoleCommand::View(view) => {
            if !session.update_presence(Some(view), None) {
                println!("(offline: view not published)");
            }
        }
        ConsoleCommand::Cursor(position) => {
            session.update_presence(None, Some(position));
        }
        ConsoleCommand::Who => {
            let now = clock.now_millis();
            if let Some(text) =
                session.with_view(|view| SessionFormatter::format_collaborators(view, now))
            {
                print!("{}", text);
            }
        }
        ConsoleCommand::Params => {
            if let Some(text) = session.with_view(SessionFormatter::format_parameters) {
                print!("{}", text);
            }
        }
        ConsoleCommand::Help => print!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
}
