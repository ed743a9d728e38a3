//! First-match rule classification.
//!
//! # Design
//! - Globs are compiled once, when the classifier is built; a bad pattern is a
//!   startup error rather than a silent non-match.
//! - Criteria inside a rule are OR-combined; rules are tried in declaration order.
//! - Content sniffing is lazy and happens at most once per file, only when a rule
//!   with MIME prefixes is reached.

use std::ffi::OsStr;
use std::path::Path;

use dropwatch_config::Rule;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{FsOpsError, FsOpsResult};
use crate::mime;

/// Ordered rule matcher.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    globs: Option<GlobSet>,
    mime_prefixes: Vec<String>,
}

impl Classifier {
    /// Compile `rules`, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Glob`] naming the rule and pattern that failed to compile.
    pub fn new(rules: &[Rule]) -> FsOpsResult<Self> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<FsOpsResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Return the first rule matching `path`, or `None` when nothing applies.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<&Rule> {
        let name = path.file_name()?;
        let extension = path.extension().and_then(OsStr::to_str);
        let mut content_type: Option<String> = None;

        self.rules
            .iter()
            .find(|compiled| {
                compiled.matches_name(name)
                    || compiled.matches_extension(extension)
                    || (!compiled.mime_prefixes.is_empty()
                        && compiled.matches_content_type(
                            content_type.get_or_insert_with(|| {
                                mime::detect_content_type(path).to_ascii_lowercase()
                            }),
                        ))
            })
            .map(|compiled| &compiled.rule)
    }
}

impl CompiledRule {
    fn compile(rule: &Rule) -> FsOpsResult<Self> {
        let globs = if rule.patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &rule.patterns {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| FsOpsError::glob(&rule.name, pattern, source))?;
                builder.add(glob);
            }
            Some(
                builder
                    .build()
                    .map_err(|source| FsOpsError::glob(&rule.name, "<set>", source))?,
            )
        };
        let mime_prefixes = rule
            .mime_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| prefix.to_ascii_lowercase())
            .collect();
        Ok(Self {
            rule: rule.clone(),
            globs,
            mime_prefixes,
        })
    }

    fn matches_name(&self, name: &OsStr) -> bool {
        self.globs.as_ref().is_some_and(|globs| globs.is_match(name))
    }

    fn matches_extension(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| {
            self.rule
                .extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
    }

    fn matches_content_type(&self, content_type: &str) -> bool {
        !content_type.is_empty()
            && self
                .mime_prefixes
                .iter()
                .any(|prefix| content_type.starts_with(prefix.as_str()))
    }
}
