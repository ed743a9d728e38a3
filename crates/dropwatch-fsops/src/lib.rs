//! Filesystem core of the dropwatch dispatcher: rule classification, content
//! sniffing, write-stability detection and crash-safe transfers.
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
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod error;
pub mod mime;
pub mod model;
pub mod stability;
pub mod transfer;

pub use classify::Classifier;
pub use error::{FsOpsError, FsOpsResult};
pub use mime::detect_content_type;
pub use model::TransferIntent;
pub use stability::{STABILITY_CEILING, wait_until_stable, wait_until_stable_with};
pub use transfer::{
    MAX_DISAMBIGUATION_ATTEMPTS, find_duplicate, numbered_variant, unique_destination,
};
