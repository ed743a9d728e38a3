//! Per-path dispatch state machine.
//!
//! # Design
//! - Guard → filter → stabilize → classify → resolve destination → duplicate check →
//!   transfer → post-actions. Every path through the machine ends in exactly one
//!   [`DispatchOutcome`], logged and counted once with a single matching bus event.
//! - `FileDispatched` goes out as soon as the bytes are in place so notifications do
//!   not wait on the upload; the upload then reports on its own.
//! - The in-flight claim is held for the whole run and released on every exit.
//! - Per-file failures are values, never errors; the watcher loop keeps going.
//! - Filesystem work past the stability wait runs on the blocking pool.

use std::ffi::OsStr;
use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dropwatch_config::{Config, Rule, RuleAction};
use dropwatch_events::{Event, EventBus};
use dropwatch_fsops::{Classifier, FsOpsError, TransferIntent, find_duplicate, wait_until_stable};
use dropwatch_telemetry::Metrics;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, render_chain};
use crate::inflight::InFlight;
use crate::upload::{UploadTarget, upload_with_timeout};

/// What caused a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A live filesystem event; the file may still be growing.
    Event,
    /// The startup scan; the file is assumed complete.
    CatchUp,
}

/// Why a file was dropped before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The path no longer exists.
    Missing,
    /// The path is a directory.
    Directory,
    /// The extension is on the ignore list.
    Extension,
}

/// Why the stability wait gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityFailure {
    /// The file disappeared while being sampled.
    Vanished,
    /// The size never settled before the safety ceiling.
    TimedOut,
}

/// Dispatch stage that failed with an IO error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    /// Matching the file against the rules.
    Classify,
    /// Creating the destination directory.
    CreateDestination,
    /// Inspecting the destination for duplicates.
    DuplicateCheck,
    /// Deleting a redundant source after a duplicate hit.
    RemoveDuplicate,
    /// Moving or copying the file.
    Transfer,
}

impl FailedStage {
    /// Stable label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::CreateDestination => "create_destination",
            Self::DuplicateCheck => "duplicate_check",
            Self::RemoveDuplicate => "remove_duplicate",
            Self::Transfer => "transfer",
        }
    }
}

/// Result of the optional remote upload after a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// The rule does not upload.
    NotRequested,
    /// The rule uploads but no sink is configured.
    Unavailable,
    /// The upload finished.
    Uploaded {
        /// Remote path written.
        remote_path: String,
    },
    /// The upload failed; the local transfer stands.
    Failed,
    /// The upload did not finish in time; it may still complete in the background.
    TimedOut,
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another dispatch already holds the path.
    Busy,
    /// The path was filtered out.
    Ignored(IgnoreReason),
    /// The file never became stable.
    Unstable(StabilityFailure),
    /// No rule matched.
    NoMatch,
    /// The matching rule has no destination.
    NoDestination {
        /// Matching rule.
        rule: String,
    },
    /// A same-name, same-size file already sits at the destination.
    Duplicate {
        /// Matching rule.
        rule: String,
        /// Existing file considered identical.
        existing: PathBuf,
        /// Whether the source was deleted (move rules) or left alone (copy rules).
        removed_source: bool,
    },
    /// The file was moved or copied.
    Transferred {
        /// Matching rule.
        rule: String,
        /// Action performed.
        action: RuleAction,
        /// Final destination path.
        destination: PathBuf,
        /// Outcome of the optional upload.
        upload: UploadStatus,
    },
    /// A filesystem step failed; the file is left in its last safe state.
    Failed {
        /// Stage that failed.
        stage: FailedStage,
        /// Rendered error chain.
        message: String,
    },
}

impl DispatchOutcome {
    /// Stable label used for the `dispatch_outcomes_total` metric.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::Ignored(_) => "ignored",
            Self::Unstable(StabilityFailure::Vanished) => "vanished",
            Self::Unstable(StabilityFailure::TimedOut) => "unstable",
            Self::NoMatch => "no_match",
            Self::NoDestination { .. } => "no_destination",
            Self::Duplicate { .. } => "duplicate",
            Self::Transferred { .. } => "transferred",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Dispatch coordinator shared by every trigger.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    classifier: Classifier,
    ignore_exts: Vec<String>,
    settle: Duration,
    poll: Duration,
    create_dest_dirs: bool,
    upload: Option<UploadTarget>,
    inflight: InFlight,
    events: EventBus,
    metrics: Metrics,
}

impl Dispatcher {
    /// Build a dispatcher from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Rules`] when a rule pattern does not compile.
    pub fn new(
        config: &Config,
        events: EventBus,
        metrics: Metrics,
        upload: Option<UploadTarget>,
    ) -> AppResult<Self> {
        let classifier =
            Classifier::new(&config.rules).map_err(|source| AppError::Rules { source })?;
        if upload.is_none() {
            for rule in config.rules.iter().filter(|rule| rule.upload_prefix.is_some()) {
                warn!(rule = %rule.name, "rule requests upload but no webdav url is configured");
            }
        }
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                classifier,
                ignore_exts: config.ignore_exts.clone(),
                settle: config.settle,
                poll: config.poll,
                create_dest_dirs: config.create_dest_dirs,
                upload,
                inflight: InFlight::new(metrics.clone()),
                events,
                metrics,
            }),
        })
    }

    /// Run the dispatch for `path` on its own task.
    #[must_use]
    pub fn spawn(&self, path: PathBuf, trigger: Trigger) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(&path, trigger).await })
    }

    /// Drive `path` through the state machine and report its terminal state.
    pub async fn dispatch(&self, path: &Path, trigger: Trigger) -> DispatchOutcome {
        let outcome = match self.inner.inflight.claim(path) {
            Some(claim) => {
                let outcome = self.run(path, trigger).await;
                drop(claim);
                outcome
            }
            None => DispatchOutcome::Busy,
        };
        self.record(path, trigger, &outcome);
        outcome
    }

    async fn run(&self, path: &Path, trigger: Trigger) -> DispatchOutcome {
        match tokio::fs::metadata(path).await {
            Err(_) => return DispatchOutcome::Ignored(IgnoreReason::Missing),
            Ok(meta) if meta.is_dir() => return DispatchOutcome::Ignored(IgnoreReason::Directory),
            Ok(_) => {}
        }
        if self.is_ignored(path) {
            return DispatchOutcome::Ignored(IgnoreReason::Extension);
        }

        if trigger == Trigger::Event
            && let Err(err) = wait_until_stable(path, self.inner.settle, self.inner.poll).await
        {
            debug!(path = %path.display(), error = %render_chain(&err), "stability wait failed");
            return DispatchOutcome::Unstable(StabilityFailure::from(&err));
        }

        let rule = match self.classify(path).await {
            Ok(Some(rule)) => rule,
            Ok(None) => return DispatchOutcome::NoMatch,
            Err(err) => return failed(FailedStage::Classify, &err),
        };
        let Some(dest_dir) = rule.dest.as_deref() else {
            return DispatchOutcome::NoDestination { rule: rule.name };
        };

        if self.inner.create_dest_dirs
            && let Err(err) = tokio::fs::create_dir_all(dest_dir).await
        {
            return failed(FailedStage::CreateDestination, &err);
        }

        let check_duplicates =
            rule.skip_duplicates || (trigger == Trigger::CatchUp && rule.action == RuleAction::Copy);
        let (source, target_dir, rule_name) =
            (path.to_path_buf(), dest_dir.to_path_buf(), rule.name.clone());
        let action = rule.action;
        let placed = tokio::task::spawn_blocking(move || {
            place(&source, &target_dir, &rule_name, action, check_duplicates)
        })
        .await;
        let landed = match placed {
            Ok(ControlFlow::Continue(landed)) => landed,
            Ok(ControlFlow::Break(outcome)) => return outcome,
            Err(err) => return failed(FailedStage::Transfer, &err),
        };
        self.publish(Event::FileDispatched {
            path: path.display().to_string(),
            destination: landed.display().to_string(),
            rule: rule.name.clone(),
            action: rule.action.to_string(),
        });

        let upload = match rule.upload_prefix.as_deref() {
            Some(prefix) => self.upload(&landed, prefix).await,
            None => UploadStatus::NotRequested,
        };
        DispatchOutcome::Transferred {
            rule: rule.name,
            action: rule.action,
            destination: landed,
            upload,
        }
    }

    /// Match `path` against the rules on the blocking pool, since content
    /// sniffing reads the file.
    async fn classify(&self, path: &Path) -> Result<Option<Rule>, JoinError> {
        let dispatcher = self.clone();
        let source = path.to_path_buf();
        tokio::task::spawn_blocking(move || dispatcher.inner.classifier.classify(&source).cloned())
            .await
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.extension().and_then(OsStr::to_str).is_some_and(|ext| {
            self.inner
                .ignore_exts
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(ext))
        })
    }

    async fn upload(&self, destination: &Path, prefix: &str) -> UploadStatus {
        let Some(target) = self.inner.upload.as_ref() else {
            return UploadStatus::Unavailable;
        };
        let destination_label = destination.display().to_string();
        match upload_with_timeout(target, destination, prefix).await {
            Ok(remote_path) => {
                info!(destination = %destination_label, remote_path = %remote_path, "uploaded");
                self.inner.metrics.inc_upload("ok");
                self.publish(Event::UploadCompleted {
                    destination: destination_label,
                    remote_path: remote_path.clone(),
                });
                UploadStatus::Uploaded { remote_path }
            }
            Err(err) => {
                let timed_out = err.is_timeout();
                let message = render_chain(&err);
                warn!(
                    destination = %destination_label,
                    timed_out,
                    error = %message,
                    "upload failed; local transfer kept"
                );
                self.inner
                    .metrics
                    .inc_upload(if timed_out { "timeout" } else { "failed" });
                self.publish(Event::UploadFailed {
                    destination: destination_label,
                    message,
                });
                if timed_out {
                    UploadStatus::TimedOut
                } else {
                    UploadStatus::Failed
                }
            }
        }
    }

    fn record(&self, path: &Path, trigger: Trigger, outcome: &DispatchOutcome) {
        self.inner.metrics.inc_dispatch_outcome(outcome.label());
        let path_label = path.display().to_string();
        let event = match outcome {
            DispatchOutcome::Busy => {
                debug!(path = %path.display(), "already in flight");
                Some(skipped(path_label, "busy"))
            }
            DispatchOutcome::Ignored(reason) => {
                let reason = match reason {
                    IgnoreReason::Missing => "missing",
                    IgnoreReason::Directory => "directory",
                    IgnoreReason::Extension => "ignored_extension",
                };
                debug!(path = %path.display(), reason, "skip");
                Some(skipped(path_label, reason))
            }
            DispatchOutcome::Unstable(StabilityFailure::Vanished) => {
                info!(path = %path.display(), "skip: file vanished before it settled");
                Some(skipped(path_label, "vanished"))
            }
            DispatchOutcome::Unstable(StabilityFailure::TimedOut) => {
                warn!(path = %path.display(), "skip: file did not stabilize");
                Some(skipped(path_label, "unstable"))
            }
            DispatchOutcome::NoMatch => {
                info!(path = %path.display(), "no rule matched");
                Some(skipped(path_label, "no_match"))
            }
            DispatchOutcome::NoDestination { rule } => {
                warn!(path = %path.display(), rule = %rule, "rule has no destination; skipping");
                Some(skipped(path_label, "no_destination"))
            }
            DispatchOutcome::Duplicate {
                rule,
                existing,
                removed_source,
            } => {
                let message = if *removed_source {
                    "deleted duplicate source"
                } else {
                    "skip: already exists"
                };
                info!(
                    path = %path.display(),
                    rule = %rule,
                    existing = %existing.display(),
                    "{message}"
                );
                Some(Event::DuplicateResolved {
                    path: path_label,
                    rule: rule.clone(),
                    removed_source: *removed_source,
                })
            }
            DispatchOutcome::Transferred {
                rule,
                action,
                destination,
                ..
            } => {
                info!(
                    path = %path.display(),
                    rule = %rule,
                    action = %action,
                    destination = %destination.display(),
                    catch_up = trigger == Trigger::CatchUp,
                    "dispatched"
                );
                None
            }
            DispatchOutcome::Failed { stage, message } => {
                warn!(
                    path = %path.display(),
                    stage = stage.as_str(),
                    error = %message,
                    "dispatch failed"
                );
                Some(Event::DispatchFailed {
                    path: path_label,
                    stage: stage.as_str().to_string(),
                    message: message.clone(),
                })
            }
        };
        if let Some(event) = event {
            self.publish(event);
        }
    }

    fn publish(&self, event: Event) {
        self.inner.metrics.inc_event(event.kind());
        let _ = self.inner.events.publish(event);
    }
}

/// Duplicate check, planning and transfer for one file. Runs on the blocking pool.
///
/// Breaks with the terminal outcome when the file does not land, otherwise
/// continues with the path it landed at.
fn place(
    source: &Path,
    dest_dir: &Path,
    rule: &str,
    action: RuleAction,
    check_duplicates: bool,
) -> ControlFlow<DispatchOutcome, PathBuf> {
    if check_duplicates {
        match find_duplicate(source, dest_dir) {
            Ok(Some(existing)) => {
                return ControlFlow::Break(resolve_duplicate(source, rule, action, existing));
            }
            Ok(None) => {}
            Err(err) => return ControlFlow::Break(failed(FailedStage::DuplicateCheck, &err)),
        }
    }

    let Some(intent) = TransferIntent::plan(source, dest_dir, action) else {
        return ControlFlow::Break(DispatchOutcome::Ignored(IgnoreReason::Missing));
    };
    match intent.execute() {
        Ok(landed) => ControlFlow::Continue(landed),
        Err(err) => ControlFlow::Break(failed(FailedStage::Transfer, &err)),
    }
}

fn resolve_duplicate(
    source: &Path,
    rule: &str,
    action: RuleAction,
    existing: PathBuf,
) -> DispatchOutcome {
    let removed_source = match action {
        RuleAction::Move => {
            if let Err(err) = std::fs::remove_file(source) {
                return failed(FailedStage::RemoveDuplicate, &err);
            }
            true
        }
        RuleAction::Copy => false,
    };
    DispatchOutcome::Duplicate {
        rule: rule.to_string(),
        existing,
        removed_source,
    }
}

fn failed(stage: FailedStage, err: &(dyn std::error::Error + 'static)) -> DispatchOutcome {
    DispatchOutcome::Failed {
        stage,
        message: render_chain(err),
    }
}

fn skipped(path: String, reason: &str) -> Event {
    Event::FileSkipped {
        path,
        reason: reason.to_string(),
    }
}

impl From<&FsOpsError> for StabilityFailure {
    fn from(err: &FsOpsError) -> Self {
        if err.is_timeout() {
            Self::TimedOut
        } else {
            Self::Vanished
        }
    }
}
