//! Interactive terminal control path
//!
//! When the process runs attached to a terminal, lines of the form
//! `<printer_key> [<job_id>]` register (or, with the id omitted, clear) a
//! printer's job registration. Headless runs skip this entirely.

use std::io::IsTerminal;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Spawn the stdin reader if stdin is a TTY.
pub fn spawn(state: Arc<AppState>, token: CancellationToken) {
    if !std::io::stdin().is_terminal() {
        return;
    }

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => handle_line(&state, line.trim()).await,
                        // stdin closed or failed; nothing left to read.
                        Ok(None) | Err(_) => break,
                    }
                }
            }
        }
    });
}

async fn handle_line(state: &AppState, line: &str) {
    if line.is_empty() {
        println!("Usage: <printer_key> [<job_id>]");
        return;
    }

    let mut parts = line.split_whitespace();
    let key = parts.next().unwrap_or_default();
    let job_id = parts.next().unwrap_or_default();

    match state.monitor(key) {
        Some(monitor) => monitor.set_registered_job_id(job_id).await,
        None => println!("Error: printer not found"),
    }
}
