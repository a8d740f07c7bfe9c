//! Application event loop
//!
//! One task multiplexes the registry poll, console input, and recording
//! events, so refreshes never overlap and commands run one at a time.

use crate::commands::{console, windows, AppState};
use crate::recorder::{RecordingError, RecordingEvent, RecordingState};
use crate::utils::{AppError, AppResult, ErrorResponse};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

/// Run against the process stdin and stdout until `quit`, EOF or Ctrl-C
pub async fn run(state: AppState) -> AppResult<()> {
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    run_with_io(&state, input, output).await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> AppResult<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

/// Event loop over arbitrary line input and output
pub async fn run_with_io<R, W>(state: &AppState, input: R, mut output: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut refresh = tokio::time::interval(state.config.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut events = state.coordinator.lock().await.subscribe();
    let mut lines = input.lines();

    tracing::info!(
        "Dock running, refreshing every {}ms, recordings go to {}",
        state.config.refresh_interval_ms,
        state.config.recordings_dir.display()
    );

    // Fill the dock before the first command is read
    refresh.tick().await;
    if let Err(e) = windows::refresh_windows(state).await {
        tracing::warn!("Window refresh failed: {}", e);
    }

    loop {
        tokio::select! {
            biased;

            _ = refresh.tick() => {
                if let Err(e) = windows::refresh_windows(state).await {
                    tracing::warn!("Window refresh failed: {}", e);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::debug!("Console input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let (reply, quit) = console::handle_line(state, &line).await;
                write_line(&mut output, &reply).await?;
                if quit {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = handle_event(state, event).await {
                        write_line(&mut output, &line).await?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} recording events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    shutdown(state).await;
    Ok(())
}

/// React to a recording event; returns a notification line for the UI
pub async fn handle_event(state: &AppState, event: RecordingEvent) -> Option<String> {
    match event {
        RecordingEvent::Failed { session, message } => {
            let mut coordinator = state.coordinator.lock().await;
            if coordinator.session_id() != Some(session) {
                tracing::debug!("Ignoring failure from finished session {}: {}", session, message);
                return None;
            }
            tracing::error!("Stopping recording after write failure: {}", message);
            let error = match coordinator.stop().await {
                Ok(_) | Err(RecordingError::MidSession(_)) => RecordingError::MidSession(message),
                Err(other) => other,
            };
            let response = ErrorResponse::from(AppError::from(error));
            Some(json!({ "event": "recordingFailed", "error": response }).to_string())
        }
        RecordingEvent::Started(path) => {
            Some(json!({ "event": "recordingStarted", "outputPath": path }).to_string())
        }
        RecordingEvent::Stopped(path) => {
            Some(json!({ "event": "recordingStopped", "outputPath": path }).to_string())
        }
        other => {
            tracing::trace!("Recording event: {:?}", other);
            None
        }
    }
}

/// Finalize any recording still in progress
async fn shutdown(state: &AppState) {
    let mut coordinator = state.coordinator.lock().await;
    if coordinator.state() == RecordingState::Idle {
        return;
    }
    tracing::info!("Finalizing recording before exit");
    match coordinator.stop().await {
        Ok(Some(output)) => tracing::info!("Saved {}", output.output_path.display()),
        Ok(None) => {}
        Err(e) => tracing::error!("Recording could not be finalized cleanly: {}", e),
    }
}
