// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. cache::CacheError)
    clippy::module_name_repetitions
)]

//! # rfcview
//!
//! Navigation for RFCs kept as paginated plain text.
//!
//! rfcview locates RFC documents in a local cache, downloads the ones that
//! are missing, and positions the cursor on a requested page, section,
//! appendix, reference or line range.
//!
//! ## Modules
//!
//! - [`address`]: `rfc:` URIs and free-form RFC input
//! - [`paths`]: `~` and `~user` expansion backed by the system user list
//! - [`cache`]: local-or-fetch resolution of RFC files
//! - [`pages`]: form-feed page index and page movement
//! - [`fragment`]: fragment parsing and positioning
//! - [`document`]: the editor/host seam and an in-memory host
//! - [`commands`]: bindable commands and the URI opener
//! - [`config`]: flag-file configuration

pub mod address;
pub mod cache;
pub mod commands;
pub mod config;
pub mod document;
pub mod fragment;
pub mod pages;
pub mod paths;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::address::RfcAddress;
    pub use crate::cache::{DocumentCache, HttpFetcher, Resolution};
    pub use crate::commands::{Command, CommandOutcome, dispatch};
    pub use crate::document::{DocumentHost, Editor, Point, Selection, TextEditor, Workspace};
    pub use crate::fragment::{Fragment, FragmentOutcome};
    pub use crate::pages::PageIndex;
    pub use crate::paths::PathResolver;
}
