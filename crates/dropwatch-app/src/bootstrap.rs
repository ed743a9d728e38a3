//! Process startup, the watch loop and shutdown.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use dropwatch_config::{Config, load_config};
use dropwatch_events::EventBus;
use dropwatch_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::dispatch::{Dispatcher, Trigger};
use crate::error::{AppError, AppResult};
use crate::notifier::spawn_notifier;
use crate::scan::catch_up;
use crate::upload::{UploadSink, UploadTarget, WebDavSink};
use crate::watcher::{DirectoryWatcher, dispatch_paths};

/// Entry point for the dropwatch boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, the upload sink or the watcher
/// cannot be set up. Per-file failures never end the process.
pub async fn run_app() -> AppResult<()> {
    run_app_with(Cli::parse()).await
}

/// Boot sequence driven by already-parsed arguments.
///
/// # Errors
///
/// See [`run_app`].
pub async fn run_app_with(cli: Cli) -> AppResult<()> {
    let config =
        load_config(&cli.config).map_err(|err| AppError::config("config.load", err))?;
    init_logging(&LoggingConfig {
        level: cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL),
        format: LogFormat::from_json_flag(config.log_json),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    verify_watch_dir(&config.watch_dir)?;

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let events = EventBus::new();
    let _notifier = config.notifications.then(|| spawn_notifier(&events));
    let dispatcher = Dispatcher::new(&config, events, metrics.clone(), upload_target(&config)?)?;

    info!(
        watch_dir = %config.watch_dir.display(),
        rules = config.rules.len(),
        settle_ms = config.settle.as_millis(),
        poll_ms = config.poll.as_millis(),
        "dropwatch starting"
    );
    catch_up(&dispatcher, &config.watch_dir).await;

    let mut watcher = DirectoryWatcher::start(&config.watch_dir)?;
    info!(watch_dir = %config.watch_dir.display(), "watching");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for ctrl-c; shutting down");
                }
                break;
            }
            next = watcher.next() => match next {
                Some(Ok(event)) => {
                    for path in dispatch_paths(&event) {
                        debug!(path = %path.display(), kind = ?event.kind, "trigger");
                        drop(dispatcher.spawn(path.clone(), Trigger::Event));
                    }
                }
                Some(Err(err)) => warn!(error = %err, "watch error"),
                None => {
                    warn!("watcher channel closed");
                    break;
                }
            },
        }
    }

    info!(metrics = ?metrics.snapshot(), "dropwatch shutting down");
    Ok(())
}

/// Abort startup unless `watch_dir` is an existing directory.
///
/// # Errors
///
/// Returns [`AppError::InvalidWatchDir`] when the path is missing or not a directory.
pub fn verify_watch_dir(watch_dir: &Path) -> AppResult<()> {
    match std::fs::metadata(watch_dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(AppError::InvalidWatchDir {
            path: watch_dir.to_path_buf(),
            reason: "not_a_directory",
        }),
        Err(_) => Err(AppError::InvalidWatchDir {
            path: watch_dir.to_path_buf(),
            reason: "missing",
        }),
    }
}

fn upload_target(config: &Config) -> AppResult<Option<UploadTarget>> {
    let Some(settings) = config.webdav.as_ref() else {
        return Ok(None);
    };
    let sink = WebDavSink::new(settings).map_err(|source| AppError::Upload {
        operation: "webdav.client",
        source,
    })?;
    Ok(Some(UploadTarget {
        sink: Arc::new(sink) as Arc<dyn UploadSink>,
        timeout: settings.timeout,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropwatch_test_support::fixtures::{scratch_dir, write_file};

    #[test]
    fn watch_dir_must_be_an_existing_directory() -> anyhow::Result<()> {
        let scratch = scratch_dir("dropwatch-bootstrap-")?;
        verify_watch_dir(scratch.path())?;

        let file = write_file(scratch.path(), "plain.txt", b"x")?;
        assert!(matches!(
            verify_watch_dir(&file),
            Err(AppError::InvalidWatchDir {
                reason: "not_a_directory",
                ..
            })
        ));
        assert!(matches!(
            verify_watch_dir(&scratch.path().join("absent")),
            Err(AppError::InvalidWatchDir {
                reason: "missing",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn run_app_with_fails_fast_on_bad_config() -> anyhow::Result<()> {
        let scratch = scratch_dir("dropwatch-bootstrap-")?;
        let config = write_file(scratch.path(), "bad.yaml", b"watch_dir: /tmp\nbogus: 1\n")?;
        let cli = Cli {
            config,
            log_level: None,
        };
        assert!(matches!(
            run_app_with(cli).await,
            Err(AppError::Config {
                operation: "config.load",
                ..
            })
        ));
        Ok(())
    }
}
