use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dropwatch_app::dispatch::{IgnoreReason, StabilityFailure};
use dropwatch_app::scan::catch_up;
use dropwatch_app::{
    DispatchOutcome, Dispatcher, Trigger, UploadError, UploadSink, UploadStatus, UploadTarget,
};
use dropwatch_config::{Config, Rule, RuleAction};
use dropwatch_events::{Event, EventBus, EventStream};
use dropwatch_telemetry::Metrics;
use dropwatch_test_support::fixtures::{scratch_dir, write_file, write_sized};
use tempfile::TempDir;

struct Harness {
    _scratch: TempDir,
    watch: PathBuf,
    out: PathBuf,
    events: EventBus,
    metrics: Metrics,
    dispatcher: Dispatcher,
}

fn rule(name: &str, extensions: &[&str], action: RuleAction, dest: Option<PathBuf>) -> Rule {
    Rule {
        name: name.to_string(),
        patterns: Vec::new(),
        extensions: extensions.iter().map(ToString::to_string).collect(),
        mime_prefixes: Vec::new(),
        action,
        dest,
        skip_duplicates: false,
        upload_prefix: None,
    }
}

fn harness(
    build_rules: impl FnOnce(&Path) -> Vec<Rule>,
    upload: Option<UploadTarget>,
) -> Result<Harness> {
    let scratch = scratch_dir("dropwatch-dispatch-")?;
    let watch = scratch.path().join("watch");
    let out = scratch.path().join("out");
    std::fs::create_dir_all(&watch)?;
    let config = Config {
        watch_dir: watch.clone(),
        rules: build_rules(&out),
        ignore_exts: vec!["part".to_string(), "crdownload".to_string()],
        settle: Duration::from_millis(300),
        poll: Duration::from_millis(150),
        webdav: None,
        log_json: false,
        create_dest_dirs: true,
        notifications: false,
    };
    let events = EventBus::new();
    let metrics = Metrics::new()?;
    let dispatcher = Dispatcher::new(&config, events.clone(), metrics.clone(), upload)?;
    Ok(Harness {
        _scratch: scratch,
        watch,
        out,
        events,
        metrics,
        dispatcher,
    })
}

fn pdf_move(out: &Path) -> Vec<Rule> {
    vec![rule("docs", &["pdf"], RuleAction::Move, Some(out.to_path_buf()))]
}

async fn published(stream: &mut EventStream) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(Some(envelope)) =
        tokio::time::timeout(Duration::from_millis(50), stream.next()).await
    {
        collected.push(envelope.event);
    }
    collected
}

#[tokio::test]
async fn settled_pdf_moves_into_destination() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let source = write_file(&h.watch, "report.pdf", b"%PDF-1.7 body")?;
    let mut stream = h.events.subscribe();

    let outcome = h.dispatcher.dispatch(&source, Trigger::Event).await;

    let DispatchOutcome::Transferred {
        rule,
        action,
        destination,
        upload,
    } = outcome
    else {
        return Err(anyhow!("unexpected outcome {outcome:?}"));
    };
    assert_eq!(rule, "docs");
    assert_eq!(action, RuleAction::Move);
    assert_eq!(destination, h.out.join("report.pdf"));
    assert_eq!(upload, UploadStatus::NotRequested);
    assert!(!source.exists());
    assert_eq!(std::fs::read(&destination)?, b"%PDF-1.7 body");
    assert_eq!(h.metrics.dispatch_outcome_count("transferred"), 1);
    assert_eq!(h.metrics.snapshot().inflight_dispatches, 0);

    let events = published(&mut stream).await;
    assert!(matches!(
        events.as_slice(),
        [Event::FileDispatched { rule, action, .. }] if rule == "docs" && action == "move"
    ));
    Ok(())
}

#[tokio::test]
async fn name_collision_with_different_size_gets_numbered_variant() -> Result<()> {
    let h = harness(pdf_move, None)?;
    write_sized(&h.out, "report.pdf", 50, b'o')?;
    let source = write_sized(&h.watch, "report.pdf", 120, b'n')?;

    let outcome = h.dispatcher.dispatch(&source, Trigger::CatchUp).await;

    assert!(matches!(
        &outcome,
        DispatchOutcome::Transferred { destination, .. } if *destination == h.out.join("report (2).pdf")
    ));
    assert_eq!(std::fs::metadata(h.out.join("report.pdf"))?.len(), 50);
    assert_eq!(std::fs::metadata(h.out.join("report (2).pdf"))?.len(), 120);
    assert!(!source.exists());
    Ok(())
}

#[tokio::test]
async fn concurrent_dispatches_of_one_path_run_once() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let source = write_file(&h.watch, "report.pdf", b"%PDF-1.4 twice")?;

    let (first, second) = tokio::join!(
        h.dispatcher.dispatch(&source, Trigger::Event),
        h.dispatcher.dispatch(&source, Trigger::Event),
    );

    let outcomes = [first, second];
    let busy = outcomes
        .iter()
        .filter(|outcome| **outcome == DispatchOutcome::Busy)
        .count();
    let transferred = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, DispatchOutcome::Transferred { .. }))
        .count();
    assert_eq!((busy, transferred), (1, 1));
    assert!(h.out.join("report.pdf").exists());
    assert!(!h.out.join("report (2).pdf").exists());
    assert_eq!(h.metrics.dispatch_outcome_count("busy"), 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_move_deletes_source_without_new_copy() -> Result<()> {
    let h = harness(
        |out| {
            let mut docs = rule("docs", &["pdf"], RuleAction::Move, Some(out.to_path_buf()));
            docs.skip_duplicates = true;
            vec![docs]
        },
        None,
    )?;
    write_sized(&h.out, "report.pdf", 64, b'a')?;
    let source = write_sized(&h.watch, "report.pdf", 64, b'b')?;

    let outcome = h.dispatcher.dispatch(&source, Trigger::Event).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Duplicate {
            rule: "docs".to_string(),
            existing: h.out.join("report.pdf"),
            removed_source: true,
        }
    );
    assert!(!source.exists());
    assert!(!h.out.join("report (2).pdf").exists());
    assert_eq!(std::fs::read(h.out.join("report.pdf"))?, vec![b'a'; 64]);
    Ok(())
}

#[tokio::test]
async fn ignored_extension_is_left_in_place() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let partial = write_file(&h.watch, "movie.PART", b"partial")?;

    let outcome = h.dispatcher.dispatch(&partial, Trigger::Event).await;

    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::Extension));
    assert!(partial.exists());
    assert!(!h.out.exists());
    Ok(())
}

#[tokio::test]
async fn missing_and_directory_paths_are_ignored() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let nested = h.watch.join("nested.pdf");
    std::fs::create_dir_all(&nested)?;

    assert_eq!(
        h.dispatcher
            .dispatch(&h.watch.join("gone.pdf"), Trigger::Event)
            .await,
        DispatchOutcome::Ignored(IgnoreReason::Missing)
    );
    assert_eq!(
        h.dispatcher.dispatch(&nested, Trigger::Event).await,
        DispatchOutcome::Ignored(IgnoreReason::Directory)
    );
    assert_eq!(h.metrics.dispatch_outcome_count("ignored"), 2);
    Ok(())
}

#[tokio::test]
async fn unmatched_file_stays_put() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let notes = write_file(&h.watch, "notes.zzz", b"\x00\x01\x02binary")?;

    let outcome = h.dispatcher.dispatch(&notes, Trigger::CatchUp).await;

    assert_eq!(outcome, DispatchOutcome::NoMatch);
    assert!(notes.exists());
    Ok(())
}

#[tokio::test]
async fn rule_without_destination_skips() -> Result<()> {
    let h = harness(|_| vec![rule("loose", &["txt"], RuleAction::Move, None)], None)?;
    let note = write_file(&h.watch, "todo.txt", b"milk")?;

    let outcome = h.dispatcher.dispatch(&note, Trigger::CatchUp).await;

    assert_eq!(
        outcome,
        DispatchOutcome::NoDestination {
            rule: "loose".to_string()
        }
    );
    assert!(note.exists());
    Ok(())
}

#[tokio::test]
async fn file_removed_while_settling_reports_vanished() -> Result<()> {
    let h = harness(pdf_move, None)?;
    let source = write_file(&h.watch, "flaky.pdf", b"%PDF-1.5")?;

    let dispatch = h.dispatcher.spawn(source.clone(), Trigger::Event);
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::remove_file(&source)?;

    assert_eq!(
        dispatch.await?,
        DispatchOutcome::Unstable(StabilityFailure::Vanished)
    );
    assert_eq!(h.metrics.dispatch_outcome_count("vanished"), 1);
    Ok(())
}

#[tokio::test]
async fn catch_up_skips_copies_already_at_destination() -> Result<()> {
    let h = harness(
        |out| {
            vec![rule(
                "photos",
                &["jpg"],
                RuleAction::Copy,
                Some(out.to_path_buf()),
            )]
        },
        None,
    )?;
    write_sized(&h.out, "a.jpg", 10, b'x')?;
    let seen = write_sized(&h.watch, "a.jpg", 10, b'x')?;
    let fresh = write_sized(&h.watch, "b.jpg", 12, b'y')?;
    std::fs::create_dir_all(h.watch.join("subdir"))?;

    let outcomes = catch_up(&h.dispatcher, &h.watch).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes[0],
        DispatchOutcome::Duplicate {
            rule: "photos".to_string(),
            existing: h.out.join("a.jpg"),
            removed_source: false,
        }
    );
    assert!(matches!(
        &outcomes[1],
        DispatchOutcome::Transferred { destination, action: RuleAction::Copy, .. }
            if *destination == h.out.join("b.jpg")
    ));
    assert!(seen.exists());
    assert!(fresh.exists());
    assert!(!h.out.join("a (2).jpg").exists());
    Ok(())
}

#[derive(Default)]
struct RecordingSink {
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl UploadSink for RecordingSink {
    async fn upload(&self, remote_path: &str, payload: Vec<u8>) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .map_err(|_| UploadError::Status {
                url: remote_path.to_string(),
                status: 500,
            })?
            .push((remote_path.to_string(), payload));
        Ok(())
    }
}

struct RejectingSink;

#[async_trait]
impl UploadSink for RejectingSink {
    async fn upload(&self, remote_path: &str, _payload: Vec<u8>) -> Result<(), UploadError> {
        Err(UploadError::Status {
            url: remote_path.to_string(),
            status: 507,
        })
    }
}

fn uploading(out: &Path) -> Vec<Rule> {
    let mut docs = rule("docs", &["pdf"], RuleAction::Move, Some(out.to_path_buf()));
    docs.upload_prefix = Some("/archive/docs/".to_string());
    vec![docs]
}

#[tokio::test]
async fn transferred_file_is_uploaded_under_prefix() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let target = UploadTarget {
        sink: sink.clone(),
        timeout: Duration::from_secs(5),
    };
    let h = harness(uploading, Some(target))?;
    let source = write_file(&h.watch, "invoice.pdf", b"%PDF-1.6 invoice")?;

    let outcome = h.dispatcher.dispatch(&source, Trigger::CatchUp).await;

    assert!(matches!(
        &outcome,
        DispatchOutcome::Transferred {
            upload: UploadStatus::Uploaded { remote_path },
            ..
        } if remote_path == "/archive/docs/invoice.pdf"
    ));
    let uploads = sink
        .uploads
        .lock()
        .map_err(|_| anyhow!("sink lock poisoned"))?
        .clone();
    assert_eq!(
        uploads,
        vec![(
            "/archive/docs/invoice.pdf".to_string(),
            b"%PDF-1.6 invoice".to_vec()
        )]
    );
    assert_eq!(h.metrics.snapshot().uploads_succeeded, 1);
    Ok(())
}

#[tokio::test]
async fn failed_upload_keeps_local_transfer() -> Result<()> {
    let target = UploadTarget {
        sink: Arc::new(RejectingSink),
        timeout: Duration::from_secs(5),
    };
    let h = harness(uploading, Some(target))?;
    let source = write_file(&h.watch, "invoice.pdf", b"%PDF-1.6 invoice")?;

    let outcome = h.dispatcher.dispatch(&source, Trigger::CatchUp).await;

    assert!(matches!(
        &outcome,
        DispatchOutcome::Transferred {
            upload: UploadStatus::Failed,
            ..
        }
    ));
    assert!(h.out.join("invoice.pdf").exists());
    assert_eq!(h.metrics.snapshot().uploads_failed, 1);
    Ok(())
}

#[tokio::test]
async fn upload_rule_without_sink_reports_unavailable() -> Result<()> {
    let h = harness(uploading, None)?;
    let source = write_file(&h.watch, "invoice.pdf", b"%PDF-1.6 invoice")?;

    let outcome = h.dispatcher.dispatch(&source, Trigger::CatchUp).await;

    assert!(matches!(
        &outcome,
        DispatchOutcome::Transferred {
            upload: UploadStatus::Unavailable,
            ..
        }
    ));
    Ok(())
}
