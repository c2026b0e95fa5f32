use thiserror::Error;

use crate::config::ConfigError;
use crate::index::codec::IndexError;
use crate::registry::RegistryError;

/// Top-level error produced by the folder and mail-store core.
///
/// Each subsystem owns a narrower error enum; this type only exists so
/// callers that cross subsystem boundaries (e.g. `Folder::open`, which
/// touches both the index codec and the config codec) have a single
/// return type to propagate with `?`.
#[derive(Error, Debug)]
pub enum MailCoreError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Folder(#[from] FolderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by [`crate::folder::Folder`] operations (C4).
#[derive(Error, Debug)]
pub enum FolderError {
    #[error("index for folder {0:?} is unusable, rescan required")]
    IndexUnusable(std::path::PathBuf),

    #[error("rescan of folder {0:?} failed: directory unreadable")]
    RescanFailed(std::path::PathBuf),

    #[error("rename collision renaming {from:?} to {to:?}")]
    RenameCollision {
        from: std::path::PathBuf,
        to: std::path::PathBuf,
    },

    #[error("folder is busy (locked by another caller)")]
    FolderBusy,

    #[error("move failed: source {0:?} vanished or destination unwritable")]
    MoveFailed(std::path::PathBuf),

    #[error("folder {0:?} is a group folder and has no mail storage")]
    IsGroupFolder(std::path::PathBuf),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
