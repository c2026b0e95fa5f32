//! Top-level embedding context (spec §9 "Global mutable state"): a single
//! `Store` owns the folder registry behind an `Arc<Mutex<_>>` so an
//! embedder constructs exactly one instance at startup and clones the
//! handle into every thread (UI, transport, search) instead of reaching
//! for a `static`.
//!
//! Grounded in the teacher's own top-level state (`EmailDatabase`/
//! `FilterEngine` held as explicit fields on `app.rs`'s application
//! struct, never as process statics) — `Store` plays the same role for
//! this crate's one piece of shared state, the [`crate::registry::Registry`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::registry::{Registry, RegistryError};

/// Owns the folder registry for one store root. Cheap to clone (an `Arc`
/// bump); every clone shares the same underlying [`Registry`].
#[derive(Clone)]
pub struct Store {
    registry: Arc<Mutex<Registry>>,
}

impl Store {
    /// Open a store rooted at `root`: bootstraps the special folders and
    /// loads `.order` if one already exists (spec §4.5).
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let mut registry = Registry::new(root.as_ref());
        registry.load()?;
        registry.ensure_special_folders()?;
        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
        })
    }

    /// Lock the registry for the duration of the closure. Poisoning from a
    /// panicked holder is treated as fatal to the embedding process, the
    /// same way the original's single-process semaphore model assumes a
    /// crashed holder never resumes cleanly.
    pub fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::FolderSpecial;
    use tempfile::tempdir;

    #[test]
    fn open_bootstraps_special_folders_once() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.registry().len(), 5);

        // Reopening the same root must not duplicate the special folders.
        let store2 = Store::open(dir.path()).unwrap();
        assert_eq!(store2.registry().len(), 5);
    }

    #[test]
    fn clone_shares_the_same_underlying_registry() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let handle = store.clone();

        let idx = store.registry().find_by_special(FolderSpecial::Incoming).unwrap();
        assert_eq!(handle.registry().folder(idx).unwrap().special, FolderSpecial::Incoming);
    }
}
