use std::path::PathBuf;
use std::time::Duration;

use dropwatch_config::{ConfigError, RuleAction, load_config};
use dropwatch_test_support::fixtures::{scratch_dir, write_file};

#[test]
fn load_config_reads_full_document() -> anyhow::Result<()> {
    let scratch = scratch_dir("dropwatch-config-")?;
    let document = r#"
watch_dir: /srv/incoming
rules:
  - name: documents
    patterns: ["invoice-*"]
    extensions: [PDF, docx]
    action: Copy
    dest: /srv/documents
    skip_duplicates: true
    webdav_upload: true
    webdav_path: /inbox/
  - name: images
    mime_prefixes: ["image/"]
    dest: /srv/images
ignore_exts: [".TMP", "part"]
settle_millis: 300
poll_millis: 150
webdav:
  url: https://dav.example.com/dav
  username: alice
  password: secret
  timeout_sec: 5
log_json: true
create_dest_dirs: false
notifications: false
"#;
    let path = write_file(scratch.path(), "dropwatch.yaml", document.as_bytes())?;

    let config = load_config(&path)?;
    assert_eq!(config.watch_dir, PathBuf::from("/srv/incoming"));
    assert_eq!(config.rules.len(), 2);

    let documents = &config.rules[0];
    assert_eq!(documents.name, "documents");
    assert_eq!(documents.patterns, vec!["invoice-*"]);
    assert_eq!(documents.extensions, vec!["pdf", "docx"]);
    assert_eq!(documents.action, RuleAction::Copy);
    assert_eq!(documents.dest, Some(PathBuf::from("/srv/documents")));
    assert!(documents.skip_duplicates);
    assert_eq!(documents.upload_prefix.as_deref(), Some("/inbox/"));

    let images = &config.rules[1];
    assert_eq!(images.action, RuleAction::Move);
    assert_eq!(images.mime_prefixes, vec!["image/"]);
    assert!(images.upload_prefix.is_none());

    assert_eq!(config.ignore_exts, vec!["tmp", "part"]);
    assert_eq!(config.settle, Duration::from_millis(300));
    assert_eq!(config.poll, Duration::from_millis(150));
    let webdav = config.webdav.expect("webdav settings");
    assert_eq!(webdav.url, "https://dav.example.com/dav");
    assert_eq!(webdav.timeout, Duration::from_secs(5));
    assert!(config.log_json);
    assert!(!config.create_dest_dirs);
    assert!(!config.notifications);
    Ok(())
}

#[test]
fn load_config_rejects_typos_and_bad_actions() -> anyhow::Result<()> {
    let scratch = scratch_dir("dropwatch-config-")?;

    let typo = write_file(
        scratch.path(),
        "typo.yaml",
        b"watch_dir: /srv\nnotificatons: false\n",
    )?;
    assert!(matches!(load_config(&typo), Err(ConfigError::Parse { .. })));

    let bad_action = write_file(
        scratch.path(),
        "action.yaml",
        b"rules:\n  - name: junk\n    extensions: [tmp]\n    action: delete\n    dest: /srv\n",
    )?;
    assert!(matches!(
        load_config(&bad_action),
        Err(ConfigError::InvalidRuleAction { ref rule, .. }) if rule == "junk"
    ));
    Ok(())
}

#[test]
fn load_config_reports_missing_file() -> anyhow::Result<()> {
    let scratch = scratch_dir("dropwatch-config-")?;
    let missing = scratch.path().join("absent.yaml");
    assert!(matches!(
        load_config(&missing),
        Err(ConfigError::Io {
            operation: "config.read",
            ..
        })
    ));
    Ok(())
}
