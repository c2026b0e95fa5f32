//! Folder and mail-store core: the subsystem of a local email client that
//! owns mail on disk, classifies and indexes it, maintains consistency
//! across crashes, applies user-defined filters, and answers queries.
//!
//! This crate is a library with no GUI, no wire protocols, and no
//! MIME/charset parsing (spec §1) — it consumes already-parsed
//! [`mail_info::MailInfo`] records and opaque byte sequences, and exposes
//! hooks ([`filter::actions::FilterUiHooks`], [`search::SearchUiHooks`])
//! for the embedder to wire up the rest.

pub mod config;
pub mod error;
pub mod filter;
pub mod folder;
pub mod imap_mirror;
pub mod index;
pub mod live_filter;
pub mod lock;
pub mod mail_info;
pub mod registry;
pub mod search;
pub mod sort;
pub mod store;
pub mod thread;

pub use error::MailCoreError;
pub use folder::{Folder, FolderKind, FolderSpecial};
pub use mail_info::{MailFlags, MailInfo, Status, StatusKind};
pub use registry::Registry;
pub use store::Store;
