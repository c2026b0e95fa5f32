//! Folder registry (C5): the ordered tree of all folders, persistence of
//! order and parent links, and special/IMAP folder bootstrap (spec §4.5).
//!
//! The registry is the one process-wide singleton the design notes (spec
//! §9 "Global mutable state") ask for: it is constructed once at
//! embedding time and threaded through every operation as an explicit
//! context object, never as ambient/static state.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{self, ConfigError};
use crate::error::FolderError;
use crate::folder::{Folder, FolderKind, FolderSpecial};
use crate::imap_mirror::ImapMirrorInfo;
use crate::lock::{FolderLockGuard, RegistryLock};

const ORDER_FILE: &str = ".order";
const MAX_NAME_COLLISION_ATTEMPTS: u32 = 20;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("malformed .order line: {0:?}")]
    MalformedOrderLine(String),

    #[error("folder index {0} out of range")]
    NoSuchFolder(usize),

    #[error("folder is busy (locked by another caller)")]
    FolderBusy,

    #[error("could not find a free name for {0:?} after {MAX_NAME_COLLISION_ATTEMPTS} attempts")]
    TooManyNameCollisions(String),

    #[error(transparent)]
    Folder(#[from] FolderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The ordered tree of all folders plus the process-wide registry lock
/// (`folders_semaphore`, spec §5). Acquisition order is always
/// registry-before-folder: callers that already hold a folder lock must
/// not then acquire this one.
pub struct Registry {
    root: PathBuf,
    folders: Vec<Folder>,
    parent: Vec<Option<usize>>,
    lock: RegistryLock,
}

impl Registry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folders: Vec::new(),
            parent: Vec::new(),
            lock: RegistryLock::new(),
        }
    }

    pub fn lock(&self) -> FolderLockGuard<'_> {
        self.lock.lock()
    }

    pub fn try_lock(&self) -> Option<FolderLockGuard<'_>> {
        self.lock.try_lock()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn folder(&self, idx: usize) -> Option<&Folder> {
        self.folders.get(idx)
    }

    pub fn folder_mut(&mut self, idx: usize) -> Option<&mut Folder> {
        self.folders.get_mut(idx)
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.parent.get(idx).copied().flatten()
    }

    pub fn children_of(&self, idx: usize) -> Vec<usize> {
        self.parent
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Some(idx))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Folder> {
        self.folders.iter()
    }

    pub fn find_by_special(&self, special: FolderSpecial) -> Option<usize> {
        self.folders.iter().position(|f| f.special == special)
    }

    fn find_top_level_by_name(&self, name: &str) -> Option<usize> {
        self.folders
            .iter()
            .enumerate()
            .position(|(i, f)| self.parent[i].is_none() && f.name == name)
    }

    fn find_child_by_name(&self, parent_idx: usize, name: &str) -> Option<usize> {
        self.folders
            .iter()
            .enumerate()
            .position(|(i, f)| self.parent[i] == Some(parent_idx) && f.name == name)
    }

    pub fn try_lock_folder(&self, idx: usize) -> Option<FolderLockGuard<'_>> {
        self.folders.get(idx)?.try_lock()
    }

    /// Add `folder` to the registry as a child of `parent`, returning its
    /// new index. Does not touch the `.order` file; call [`Registry::save`]
    /// to persist.
    pub fn add_folder(&mut self, folder: Folder, parent: Option<usize>) -> usize {
        self.folders.push(folder);
        self.parent.push(parent);
        self.folders.len() - 1
    }

    // ---- order file persistence --------------------------------------

    fn order_path(&self) -> PathBuf {
        self.root.join(ORDER_FILE)
    }

    /// Rebuild the tree from `.order` (spec §4.5 "Order file"). For every
    /// leaf entry with a directory, also loads its `.config` sidecar and
    /// opens its index/rescans, same as a fresh folder creation would.
    pub fn load(&mut self) -> Result<(), RegistryError> {
        self.folders.clear();
        self.parent.clear();

        let path = self.order_path();
        if !path.exists() {
            return Ok(());
        }

        let contents = fs::read_to_string(&path)?;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 5 {
                return Err(RegistryError::MalformedOrderLine(line.to_string()));
            }
            let name = fields[0].to_string();
            let raw_path = fields[1];
            let special_num: u32 = fields[2]
                .parse()
                .map_err(|_| RegistryError::MalformedOrderLine(line.to_string()))?;
            let parent_idx: i64 = fields[3]
                .parse()
                .map_err(|_| RegistryError::MalformedOrderLine(line.to_string()))?;
            let closed = fields[4] == "1";

            let special = config::special_from_num(special_num).unwrap_or(FolderSpecial::No);
            let folder_path = if raw_path.is_empty() {
                None
            } else {
                Some(PathBuf::from(raw_path))
            };
            let kind = match special {
                FolderSpecial::Outgoing | FolderSpecial::Sent => FolderKind::Send,
                _ => FolderKind::Recv,
            };

            let mut folder = Folder::new(name, folder_path.clone(), special, kind);
            folder.closed = closed;

            if let Some(dir) = &folder_path {
                let config_path = sidecar_path(dir, "config");
                if config_path.exists() {
                    match config::load(&config_path) {
                        Ok(cfg) => apply_config(&mut folder, &cfg),
                        Err(e) => warn!(folder = %folder.name, error = %e, "could not parse .config, using defaults"),
                    }
                }
                folder.open()?;
            }

            self.folders.push(folder);
            self.parent
                .push(if parent_idx < 0 { None } else { Some(parent_idx as usize) });
        }

        Ok(())
    }

    /// Rewrite the whole `.order` file from current in-memory state (spec
    /// §4.5 "save rewrites the whole file"), and each leaf folder's
    /// `.config` sidecar alongside it.
    pub fn save(&self) -> Result<(), RegistryError> {
        let mut out = String::new();
        for (i, folder) in self.folders.iter().enumerate() {
            let path_field = folder
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let special_num = config::special_to_num(folder.special);
            let parent_field = self.parent[i].map(|p| p as i64).unwrap_or(-1);
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                folder.name, path_field, special_num, parent_field, folder.closed as u32
            ));

            if let Some(dir) = &folder.path {
                let cfg = folder_to_config(folder);
                config::save(&sidecar_path(dir, "config"), &cfg)?;
            }
        }
        fs::write(self.order_path(), out)?;
        Ok(())
    }

    // ---- special-folder bootstrap -------------------------------------

    /// Guarantee incoming/outgoing/sent/deleted/spam exist, creating their
    /// directories if missing (spec §4.5 "Special folders").
    pub fn ensure_special_folders(&mut self) -> Result<(), RegistryError> {
        const SPECIALS: [(&str, FolderSpecial, FolderKind); 5] = [
            ("incoming", FolderSpecial::Incoming, FolderKind::Recv),
            ("outgoing", FolderSpecial::Outgoing, FolderKind::Send),
            ("sent", FolderSpecial::Sent, FolderKind::Send),
            ("deleted", FolderSpecial::Deleted, FolderKind::Recv),
            ("spam", FolderSpecial::Spam, FolderKind::Recv),
        ];

        for (name, special, kind) in SPECIALS {
            if self.find_by_special(special).is_some() {
                continue;
            }
            let dir = self.root.join(name);
            fs::create_dir_all(&dir)?;
            let mut folder = Folder::new(name, Some(dir), special, kind);
            folder.open()?;
            debug!(folder = name, "bootstrapped special folder");
            self.add_folder(folder, None);
        }
        Ok(())
    }

    // ---- IMAP bootstrap -------------------------------------------------

    /// Ensure a top-level group folder named after `server` exists (spec
    /// §4.5 "IMAP bootstrap"): reused if a group already mirrors this
    /// server, otherwise created under a free name (`server`, `server-1`,
    /// … up to 20 attempts). For each existing subdirectory under the
    /// group's directory, creates a child IMAP folder if one doesn't
    /// already exist. Existing group folders are coerced to
    /// `GROUP | is_imap` every call, matching "on each startup".
    pub fn bootstrap_imap_account(&mut self, server: &str) -> Result<usize, RegistryError> {
        let group_idx = match self.find_imap_group(server) {
            Some(idx) => {
                self.folders[idx].special = FolderSpecial::Group;
                if self.folders[idx].imap.is_none() {
                    self.folders[idx].imap = Some(ImapMirrorInfo::new(server, "", ""));
                }
                idx
            }
            None => {
                let name = self.unique_top_level_name(server)?;
                let mut group = Folder::new(name, None, FolderSpecial::Group, FolderKind::Recv);
                group.imap = Some(ImapMirrorInfo::new(server, "", ""));
                self.add_folder(group, None)
            }
        };

        let group_dir = self.root.join(&self.folders[group_idx].name);
        fs::create_dir_all(&group_dir)?;

        let mut children: Vec<String> = Vec::new();
        for entry in fs::read_dir(&group_dir)?.flatten() {
            if entry.path().is_dir() {
                children.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        children.sort();

        for child_name in children {
            if self.find_child_by_name(group_idx, &child_name).is_some() {
                continue;
            }
            let child_path = group_dir.join(&child_name);
            let mut child = Folder::new(child_name.clone(), Some(child_path), FolderSpecial::No, FolderKind::Recv);
            child.imap = Some(ImapMirrorInfo::new(server, "", child_name.clone()));
            child.open()?;
            self.add_folder(child, Some(group_idx));
        }

        Ok(group_idx)
    }

    fn find_imap_group(&self, server: &str) -> Option<usize> {
        self.folders.iter().position(|f| {
            f.special == FolderSpecial::Group && f.imap.as_ref().map(|i| i.server == server).unwrap_or(false)
        })
    }

    fn unique_top_level_name(&self, base: &str) -> Result<String, RegistryError> {
        if self.find_top_level_by_name(base).is_none() {
            return Ok(base.to_string());
        }
        for n in 1..=MAX_NAME_COLLISION_ATTEMPTS {
            let candidate = format!("{base}-{n}");
            if self.find_top_level_by_name(&candidate).is_none() {
                return Ok(candidate);
            }
        }
        Err(RegistryError::TooManyNameCollisions(base.to_string()))
    }

    // ---- deletion -------------------------------------------------------

    /// Remove folder `idx` (spec §4.5 "Deletion"). Requires the folder's
    /// lock to be available. Non-group and IMAP-server-group removal
    /// wipes the directory subtree locally (`.index`/`.config` included;
    /// remote IMAP state is untouched). Removing an ordinary, non-IMAP
    /// group only re-parents its children to the removed folder's parent.
    pub fn remove_folder(&mut self, idx: usize) -> Result<(), RegistryError> {
        if idx >= self.folders.len() {
            return Err(RegistryError::NoSuchFolder(idx));
        }
        if self.folders[idx].is_locked() {
            return Err(RegistryError::FolderBusy);
        }

        let is_group = self.folders[idx].special == FolderSpecial::Group;
        let is_imap_group = is_group && self.folders[idx].imap.is_some();

        if is_group && !is_imap_group {
            let parent = self.parent[idx];
            for p in self.parent.iter_mut() {
                if *p == Some(idx) {
                    *p = parent;
                }
            }
            self.delete_node(idx);
            return Ok(());
        }

        let mut subtree = self.collect_subtree(idx);
        subtree.sort_unstable_by(|a, b| b.cmp(a));
        for i in subtree {
            if let Some(dir) = self.folders[i].path.clone() {
                let _ = fs::remove_dir_all(&dir);
                let _ = fs::remove_file(sidecar_path(&dir, "index"));
                let _ = fs::remove_file(sidecar_path(&dir, "config"));
            }
            self.delete_node(i);
        }
        Ok(())
    }

    fn collect_subtree(&self, root: usize) -> Vec<usize> {
        let mut result = vec![root];
        let mut frontier = vec![root];
        while let Some(cur) = frontier.pop() {
            for i in 0..self.parent.len() {
                if self.parent[i] == Some(cur) {
                    result.push(i);
                    frontier.push(i);
                }
            }
        }
        result
    }

    /// Remove the folder at `idx`, shifting every parent reference above
    /// it down by one to keep indices dense. Caller must have already
    /// reparented or removed anything that pointed at `idx` itself.
    fn delete_node(&mut self, idx: usize) {
        self.folders.remove(idx);
        self.parent.remove(idx);
        for p in self.parent.iter_mut() {
            if let Some(pi) = *p {
                if pi > idx {
                    *p = Some(pi - 1);
                }
            }
        }
    }
}

fn sidecar_path(dir: &Path, extension: &str) -> PathBuf {
    let mut p = dir.to_path_buf();
    p.set_extension(extension);
    p
}

fn apply_config(folder: &mut Folder, cfg: &config::FolderConfig) {
    if let Some(k) = cfg.kind {
        folder.kind = k;
    }
    if let Some(s) = cfg.primary_sort {
        folder.primary_sort = s;
    }
    folder.secondary_sort = cfg.secondary_sort;
    folder.default_to = cfg.default_to.clone();
    folder.default_from = cfg.default_from.clone();
    folder.default_reply_to = cfg.default_reply_to.clone();
    folder.default_signature = cfg.default_signature.clone();
    if cfg.is_imap {
        let mut mirror = ImapMirrorInfo::new(
            cfg.imap_server.clone().unwrap_or_default(),
            cfg.imap_user.clone().unwrap_or_default(),
            cfg.imap_path.clone().unwrap_or_default(),
        );
        mirror.all_folder_names = cfg.imap_all_folders.clone();
        mirror.subscribed_folder_names = cfg.imap_subscribed_folders.clone();
        folder.imap = Some(mirror);
    }
}

/// Build the `.config` sidecar contents for `folder`, the reverse of
/// [`apply_config`]. `Special` and `Name` are also carried by `.order`;
/// they're included here too since `config::parse` needs a well-formed
/// record and a future load of an orphaned `.config` should still be
/// self-describing.
fn folder_to_config(folder: &Folder) -> config::FolderConfig {
    let (imap_server, imap_user, imap_path, all_folders, subscribed_folders) = match &folder.imap {
        Some(m) => (
            Some(m.server.clone()),
            Some(m.user.clone()),
            Some(m.path.clone()),
            m.all_folder_names.clone(),
            m.subscribed_folder_names.clone(),
        ),
        None => (None, None, None, Vec::new(), Vec::new()),
    };
    config::FolderConfig {
        name: folder.name.clone(),
        kind: Some(folder.kind),
        special: Some(folder.special),
        primary_sort: Some(folder.primary_sort),
        secondary_sort: folder.secondary_sort,
        default_to: folder.default_to.clone(),
        default_from: folder.default_from.clone(),
        default_reply_to: folder.default_reply_to.clone(),
        default_signature: folder.default_signature.clone(),
        is_imap: folder.imap.is_some(),
        imap_user,
        imap_path,
        imap_server,
        imap_all_folders: all_folders,
        imap_subscribed_folders: subscribed_folders,
    }
}
