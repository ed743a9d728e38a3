#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! File-backed configuration for the dropwatch dispatcher.
//!
//! Layout: `model.rs` (YAML document and validated models), `validate.rs`
//! (normalisation and validation), `loader.rs` (file loading),
//! `defaults.rs` (default values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, parse_config};
pub use model::{
    Config, ConfigDocument, Rule, RuleAction, RuleDocument, WebDavDocument, WebDavSettings,
};
