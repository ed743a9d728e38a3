//! Normalisation and validation of configuration documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    Config, ConfigDocument, Rule, RuleAction, RuleDocument, WebDavDocument, WebDavSettings,
};

/// Turn a parsed document into a validated configuration.
///
/// `home` is the directory substituted for a leading `~`; it is only consulted
/// when a path actually needs expansion.
///
/// # Errors
///
/// Returns an error for invalid rule actions, a zero poll interval, a zero upload
/// timeout with a configured URL, or `~` paths without a known home directory.
pub fn validate_document(document: ConfigDocument, home: Option<&Path>) -> ConfigResult<Config> {
    let ConfigDocument {
        watch_dir,
        rules,
        ignore_exts,
        settle_millis,
        poll_millis,
        webdav,
        log_json,
        create_dest_dirs,
        notifications,
    } = document;

    if poll_millis == 0 {
        return Err(ConfigError::InvalidField {
            section: "root".to_string(),
            field: "poll_millis",
            value: Some(poll_millis.to_string()),
            reason: "must_be_positive",
        });
    }

    let rules = rules
        .into_iter()
        .map(|rule| validate_rule(rule, home))
        .collect::<ConfigResult<Vec<_>>>()?;

    for rule in rules.iter().filter(|rule| !rule.has_criteria()) {
        warn!(
            rule = %rule.name,
            "rule declares no patterns, extensions, or mime prefixes and will never match"
        );
    }

    Ok(Config {
        watch_dir: expand_with_home(&watch_dir, home)?,
        rules,
        ignore_exts: normalize_ignore_exts(ignore_exts),
        settle: Duration::from_millis(settle_millis),
        poll: Duration::from_millis(poll_millis),
        webdav: validate_webdav(webdav)?,
        log_json,
        create_dest_dirs,
        notifications,
    })
}

fn validate_rule(rule: RuleDocument, home: Option<&Path>) -> ConfigResult<Rule> {
    let RuleDocument {
        name,
        patterns,
        extensions,
        mime_prefixes,
        action,
        dest,
        skip_duplicates,
        webdav_upload,
        webdav_path,
    } = rule;

    let action = action
        .parse::<RuleAction>()
        .map_err(|value| ConfigError::InvalidRuleAction {
            rule: name.clone(),
            value,
        })?;

    let dest = if dest.trim().is_empty() {
        None
    } else {
        Some(expand_with_home(&dest, home)?)
    };

    Ok(Rule {
        name,
        patterns,
        extensions: extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect(),
        mime_prefixes,
        action,
        dest,
        skip_duplicates,
        upload_prefix: webdav_upload.then_some(webdav_path),
    })
}

fn validate_webdav(webdav: WebDavDocument) -> ConfigResult<Option<WebDavSettings>> {
    let WebDavDocument {
        url,
        username,
        password,
        skip_tls_verify,
        timeout_sec,
    } = webdav;

    if url.trim().is_empty() {
        return Ok(None);
    }
    if timeout_sec == 0 {
        return Err(ConfigError::InvalidField {
            section: "webdav".to_string(),
            field: "timeout_sec",
            value: Some(timeout_sec.to_string()),
            reason: "must_be_positive",
        });
    }

    Ok(Some(WebDavSettings {
        url: url.trim().to_string(),
        username,
        password,
        skip_tls_verify,
        timeout: Duration::from_secs(timeout_sec),
    }))
}

fn normalize_ignore_exts(ignore_exts: Vec<String>) -> Vec<String> {
    let normalized: Vec<String> = ignore_exts
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| !ext.is_empty())
        .collect();
    if normalized.is_empty() {
        return defaults::IGNORE_EXTS
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();
    }
    normalized
}

/// Lower-case an extension and strip a single leading dot.
fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    trimmed
        .strip_prefix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Expand a leading `~` or `~/` against `home`; other paths pass through untouched.
pub(crate) fn expand_with_home(raw: &str, home: Option<&Path>) -> ConfigResult<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(raw)),
    };
    let home = home.ok_or_else(|| ConfigError::HomeDirUnavailable {
        path: raw.to_string(),
    })?;
    if rest.is_empty() {
        Ok(home.to_path_buf())
    } else {
        Ok(home.join(rest))
    }
}
