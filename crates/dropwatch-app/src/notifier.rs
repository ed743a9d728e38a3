//! Best-effort desktop notifications for completed transfers.
//!
//! The notifier is a bus subscriber; the dispatcher never waits on it and never
//! learns whether a notification was shown.

use std::path::Path;

use dropwatch_events::{Event, EventBus};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TITLE: &str = "dropwatch";

/// Subscribe to `events` and raise a notification for every dispatched file.
#[must_use]
pub fn spawn_notifier(events: &EventBus) -> JoinHandle<()> {
    let mut stream = events.subscribe();
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            if let Event::FileDispatched {
                path,
                destination,
                action,
                ..
            } = envelope.event
            {
                let body = notification_body(&path, &destination, &action);
                if let Some(command) = notification_command(std::env::consts::OS, TITLE, &body) {
                    deliver(command).await;
                }
            }
        }
        debug!("notifier stopped: event bus closed");
    })
}

/// Message shown for a finished transfer, e.g. `Moved report.pdf to /srv/docs`.
pub(crate) fn notification_body(path: &str, destination: &str, action: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned());
    let dir = Path::new(destination)
        .parent()
        .map_or_else(|| destination.to_string(), |dir| dir.display().to_string());
    let verb = if action == "copy" { "Copied" } else { "Moved" };
    format!("{verb} {name} to {dir}")
}

/// Platform command for a notification; `None` where no notifier is known.
pub(crate) fn notification_command(os: &str, title: &str, body: &str) -> Option<NotifyCommand> {
    match os {
        "macos" => Some(NotifyCommand {
            program: "osascript",
            args: vec![
                "-e".to_string(),
                format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(body),
                    escape_applescript(title)
                ),
            ],
        }),
        "linux" => Some(NotifyCommand {
            program: "notify-send",
            args: vec![title.to_string(), body.to_string()],
        }),
        _ => None,
    }
}

/// Program and arguments for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotifyCommand {
    program: &'static str,
    args: Vec<String>,
}

async fn deliver(command: NotifyCommand) {
    match Command::new(command.program)
        .args(&command.args)
        .status()
        .await
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(program = command.program, %status, "notification command failed"),
        Err(err) => warn!(program = command.program, error = %err, "notification command failed"),
    }
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
