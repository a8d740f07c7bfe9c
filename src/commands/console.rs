//! Line-oriented command console
//!
//! Stands in for the dock UI: one command per line on stdin, one JSON reply
//! per line on stdout, either `{"ok": ...}` or `{"error": {code, message}}`.

use super::{recording, system, windows, AppState};
use crate::capture::traits::WindowHandle;
use crate::utils::{AppError, AppResult, ErrorResponse};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Windows,
    Activate(WindowHandle),
    Icon(WindowHandle, PathBuf),
    Start { width: Option<u32>, height: Option<u32> },
    Pause,
    Resume,
    Stop,
    Mute,
    Microphone(bool),
    State,
    Displays,
    Probe(PathBuf),
    Info,
    Help,
    Quit,
}

const HELP: &str = "refresh | windows | activate <handle> | icon <handle> <png path> | \
start [width height] | pause | resume | stop | mute | mic <on|off> | state | displays | \
probe <avi path> | info | quit";

/// Window handles are accepted in decimal or `0x` hex
pub fn parse_handle(text: &str) -> AppResult<WindowHandle> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => isize::from_str_radix(hex, 16),
        None => text.parse::<isize>(),
    };
    parsed
        .map(WindowHandle)
        .map_err(|_| AppError::InvalidCommand(format!("invalid window handle: {}", text)))
}

fn parse_dimension(text: &str) -> AppResult<u32> {
    text.parse::<u32>()
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| AppError::InvalidCommand(format!("invalid size: {}", text)))
}

impl Command {
    pub fn parse(line: &str) -> AppResult<Self> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| AppError::InvalidCommand("empty command".to_string()))?
            .to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let arity = |expected: usize| -> AppResult<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(AppError::InvalidCommand(format!(
                    "{} takes {} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                )))
            }
        };

        let command = match name.as_str() {
            "refresh" => arity(0).map(|_| Command::Refresh)?,
            "windows" | "list" => arity(0).map(|_| Command::Windows)?,
            "activate" => {
                arity(1)?;
                Command::Activate(parse_handle(args[0])?)
            }
            "icon" => {
                arity(2)?;
                Command::Icon(parse_handle(args[0])?, PathBuf::from(args[1]))
            }
            "start" => match args.as_slice() {
                [] => Command::Start {
                    width: None,
                    height: None,
                },
                [width, height] => Command::Start {
                    width: Some(parse_dimension(width)?),
                    height: Some(parse_dimension(height)?),
                },
                _ => {
                    return Err(AppError::InvalidCommand(
                        "start takes no arguments or <width> <height>".to_string(),
                    ))
                }
            },
            "pause" => arity(0).map(|_| Command::Pause)?,
            "resume" => arity(0).map(|_| Command::Resume)?,
            "stop" => arity(0).map(|_| Command::Stop)?,
            "mute" => arity(0).map(|_| Command::Mute)?,
            "mic" => {
                arity(1)?;
                match args[0].to_ascii_lowercase().as_str() {
                    "on" | "unmute" => Command::Microphone(false),
                    "off" | "mute" => Command::Microphone(true),
                    other => {
                        return Err(AppError::InvalidCommand(format!(
                            "mic expects on or off, got {}",
                            other
                        )))
                    }
                }
            }
            "state" | "status" => arity(0).map(|_| Command::State)?,
            "displays" => arity(0).map(|_| Command::Displays)?,
            "probe" => {
                arity(1)?;
                Command::Probe(PathBuf::from(args[0]))
            }
            "info" => arity(0).map(|_| Command::Info)?,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(AppError::InvalidCommand(format!("unknown command: {}", other))),
        };
        Ok(command)
    }
}

fn to_value<T: Serialize>(value: T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run one command against the app state
pub async fn dispatch(state: &AppState, command: Command) -> AppResult<Value> {
    match command {
        Command::Refresh => to_value(windows::refresh_windows(state).await?),
        Command::Windows => to_value(windows::list_windows(state)),
        Command::Activate(handle) => to_value(windows::activate_window(state, handle).await?),
        Command::Icon(handle, path) => to_value(windows::save_window_icon(state, handle, &path)?),
        Command::Start { width, height } => {
            let path = recording::start_recording(state, width, height).await?;
            Ok(json!({ "outputPath": path }))
        }
        Command::Pause => to_value(recording::pause_recording(state).await?),
        Command::Resume => to_value(recording::resume_recording(state).await?),
        Command::Stop => to_value(recording::stop_recording(state).await?),
        Command::Mute => {
            let muted = recording::toggle_mute(state).await;
            Ok(json!({ "systemMuted": muted }))
        }
        Command::Microphone(muted) => {
            let muted = recording::toggle_microphone(state, muted).await;
            Ok(json!({ "microphoneMuted": muted }))
        }
        Command::State => to_value(recording::recording_status(state).await),
        Command::Displays => to_value(system::get_displays(state)),
        Command::Probe(path) => to_value(system::probe_recording(&path).await?),
        Command::Info => to_value(system::get_system_info()),
        Command::Help => Ok(json!({ "commands": HELP })),
        Command::Quit => Ok(json!("bye")),
    }
}

/// Format a command result as one reply line
pub fn reply(result: AppResult<Value>) -> String {
    let value = match result {
        Ok(value) => json!({ "ok": value }),
        Err(error) => {
            tracing::debug!("Command failed: {}", error);
            json!({ "error": ErrorResponse::from(error) })
        }
    };
    value.to_string()
}

/// Parse and run one line. Returns the reply and whether the app should exit.
pub async fn handle_line(state: &AppState, line: &str) -> (String, bool) {
    match Command::parse(line) {
        Ok(command) => {
            let quit = command == Command::Quit;
            (reply(dispatch(state, command).await), quit)
        }
        Err(e) => (reply(Err(e)), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DockConfig;
    use crate::testing::{FakeCapture, FakeSurface};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn state(dir: &std::path::Path) -> (AppState, Arc<FakeSurface>) {
        let surface = Arc::new(FakeSurface::new());
        let config = DockConfig {
            recordings_dir: dir.to_path_buf(),
            ..Default::default()
        };
        let state = AppState::new(config, surface.clone(), Arc::new(FakeCapture::new(16, 16)));
        (state, surface)
    }

    fn parse_reply(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_parse_handles() {
        assert_eq!(parse_handle("42").unwrap(), WindowHandle(42));
        assert_eq!(parse_handle("0x1a").unwrap(), WindowHandle(26));
        assert!(parse_handle("window").is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("REFRESH").unwrap(), Command::Refresh);
        assert_eq!(
            Command::parse("start 1920 1080").unwrap(),
            Command::Start {
                width: Some(1920),
                height: Some(1080)
            }
        );
        assert_eq!(Command::parse("mic off").unwrap(), Command::Microphone(true));
        assert!(Command::parse("start 1920").is_err());
        assert!(Command::parse("start 0 10").is_err());
        assert!(Command::parse("activate").is_err());
        assert!(Command::parse("dance").is_err());
        assert!(Command::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_unknown_command_reply() {
        let dir = tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (line, quit) = handle_line(&state, "dance").await;
        assert!(!quit);
        assert_eq!(parse_reply(&line)["error"]["code"], "INVALID_COMMAND");
    }

    #[tokio::test]
    async fn test_session_over_console() {
        let dir = tempdir().unwrap();
        let (state, surface) = state(dir.path());
        surface.set_windows(vec![FakeSurface::window(5, "notepad.exe", "Notes")]);

        let (line, _) = handle_line(&state, "refresh").await;
        assert_eq!(parse_reply(&line)["ok"]["added"], 1);

        let (line, _) = handle_line(&state, "windows").await;
        assert_eq!(parse_reply(&line)["ok"][0]["handle"], 5);

        let (line, _) = handle_line(&state, "stop").await;
        assert_eq!(parse_reply(&line)["ok"], Value::Null);

        let (line, _) = handle_line(&state, "start").await;
        assert!(parse_reply(&line)["ok"]["outputPath"].is_string());

        let (line, _) = handle_line(&state, "resume").await;
        assert_eq!(parse_reply(&line)["error"]["code"], "RECORDING_ERROR");

        let (line, _) = handle_line(&state, "state").await;
        assert_eq!(parse_reply(&line)["ok"]["state"], "recording");

        let (line, _) = handle_line(&state, "stop").await;
        let reply = parse_reply(&line);
        let path = reply["ok"]["outputPath"].as_str().unwrap().to_string();

        let (line, _) = handle_line(&state, &format!("probe {}", path)).await;
        let reply = parse_reply(&line);
        assert_eq!(reply["ok"]["width"], 16);
        assert_eq!(reply["ok"]["hasIndex"], true);

        let (_, quit) = handle_line(&state, "quit").await;
        assert!(quit);
    }
}
