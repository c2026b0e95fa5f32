//! Folder entity (C4): one folder's state, locking, and mail-info array;
//! loads/saves the index; sorts on demand (spec §4.4).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::FolderError;
use crate::imap_mirror::ImapMirrorInfo;
use crate::index::{codec, filename};
use crate::lock::FolderLock;
use crate::mail_info::{MailInfo, Status, StatusKind};
use crate::sort::{FolderKind as SortFolderKind, SortField, SortSpec, Sorter};

/// What kind of content a folder holds (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderSpecial {
    No,
    Incoming,
    Outgoing,
    Sent,
    Deleted,
    Spam,
    Group,
}

/// Receive/send/mailing-list classification (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Recv,
    Send,
    MailingList,
}

impl FolderKind {
    fn as_sort_kind(self) -> SortFolderKind {
        match self {
            FolderKind::Send => SortFolderKind::Send,
            _ => SortFolderKind::Receive,
        }
    }
}

/// Whether a structural mutation should destroy the cached sorted view or
/// keep it up to date via a stable insert (spec §4.4 "Add algorithm").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSort {
    Destructive,
    Sorted,
}

/// A restartable iteration cursor (spec §9 "Coroutine-like iteration"): a
/// plain integer position into the currently active view.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor(pub usize);

impl Cursor {
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// One folder's state (spec §3 "Folder").
pub struct Folder {
    pub name: String,
    pub path: Option<PathBuf>,
    pub special: FolderSpecial,
    pub kind: FolderKind,
    pub closed: bool,

    mail_info_array: Vec<MailInfo>,
    sorted_mail_info_array: Option<Vec<usize>>,
    pending_mail_info_array: Vec<MailInfo>,

    pub mail_infos_loaded: bool,
    pub index_uptodate: bool,
    /// `-1` = unknown (no index yet).
    pub num_index_mails: i32,
    pub unread_mails: i32,
    pub new_mails: i32,

    pub primary_sort: SortSpec,
    pub secondary_sort: Option<SortSpec>,

    pub default_to: Option<String>,
    pub default_from: Option<String>,
    pub default_reply_to: Option<String>,
    pub default_signature: Option<String>,

    pub imap: Option<ImapMirrorInfo>,

    pub ref_folder: Option<String>,
    pub live_filter: Option<String>,

    lock: FolderLock,
}

impl Folder {
    /// Create a fresh, empty, not-yet-persisted folder entity.
    pub fn new(name: impl Into<String>, path: Option<PathBuf>, special: FolderSpecial, kind: FolderKind) -> Self {
        Self {
            name: name.into(),
            path,
            special,
            kind,
            closed: false,
            mail_info_array: Vec::new(),
            sorted_mail_info_array: None,
            pending_mail_info_array: Vec::new(),
            mail_infos_loaded: false,
            index_uptodate: false,
            num_index_mails: -1,
            unread_mails: 0,
            new_mails: 0,
            primary_sort: SortSpec::new(SortField::Date, true),
            secondary_sort: None,
            default_to: None,
            default_from: None,
            default_reply_to: None,
            default_signature: None,
            imap: None,
            ref_folder: None,
            live_filter: None,
            lock: FolderLock::new(),
        }
    }

    pub fn lock(&self) -> crate::lock::FolderLockGuard<'_> {
        self.lock.lock()
    }

    pub fn try_lock(&self) -> Option<crate::lock::FolderLockGuard<'_>> {
        self.lock.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    fn index_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|p| {
            let mut index = p.clone();
            index.set_extension("index");
            index
        })
    }

    fn sorter(&self) -> Sorter {
        Sorter::new(self.primary_sort, self.secondary_sort, self.kind.as_sort_kind())
    }

    // ---- open / load -----------------------------------------------

    /// Open the folder at `path`: try to load its index; on any
    /// `IndexUnusable` condition (spec §4.1 "Error conditions" / §4.1
    /// "Crash semantics"), fall back to a directory rescan.
    pub fn open(&mut self) -> Result<(), FolderError> {
        let Some(index_path) = self.index_path() else {
            return Err(FolderError::IsGroupFolder(PathBuf::new()));
        };

        if !index_path.exists() {
            self.num_index_mails = -1;
            return self.rescan();
        }

        match codec::load(&index_path) {
            Ok(loaded) if loaded.header.pending && self.pending_mail_info_array.is_empty() => {
                warn!(folder = %self.name, "index has unclean-shutdown pending marker set, rescanning");
                self.rescan()
            }
            Ok(loaded) => {
                self.mail_info_array = loaded.mails;
                self.mail_infos_loaded = true;

                let mut num_mails = loaded.header.num_mails;
                let mut unread = loaded.header.unread;

                // A non-empty pending array means mails were added via
                // `add_mail` while this folder was only counts-only open
                // (spec §4.4 "Add algorithm"); the on-disk header still
                // reflects the pre-pending totals, so they must be merged
                // and counted here rather than overwritten by the stale
                // disk counts (spec §8 scenario 1).
                if !self.pending_mail_info_array.is_empty() {
                    let pending = std::mem::take(&mut self.pending_mail_info_array);
                    for mail in pending {
                        if mail.status.kind == StatusKind::Unread {
                            unread += 1;
                        }
                        self.mail_info_array.push(mail);
                    }
                    num_mails = self.mail_info_array.len() as i32;
                    self.index_uptodate = false;
                } else {
                    self.index_uptodate = true;
                }

                self.link_all_threads();
                self.num_index_mails = num_mails;
                self.unread_mails = unread;
                self.new_mails = self
                    .mail_info_array
                    .iter()
                    .filter(|m| m.is_new())
                    .count() as i32;
                Ok(())
            }
            Err(e) => {
                debug!(folder = %self.name, error = %e, "index unusable, rescanning");
                self.rescan()
            }
        }
    }

    /// Open the index header only, without parsing every record — used
    /// for the "counts-only" mode referenced by the pending-add path.
    pub fn open_counts_only(&mut self) -> Result<(), FolderError> {
        let Some(index_path) = self.index_path() else {
            return Err(FolderError::IsGroupFolder(PathBuf::new()));
        };
        if !index_path.exists() {
            self.num_index_mails = -1;
            return Ok(());
        }
        match codec::load(&index_path) {
            Ok(loaded) => {
                self.num_index_mails = loaded.header.num_mails;
                self.unread_mails = loaded.header.unread;
                self.mail_infos_loaded = false;
                self.index_uptodate = true;
                Ok(())
            }
            Err(e) => {
                debug!(folder = %self.name, error = %e, "index unusable in counts-only open");
                self.num_index_mails = -1;
                Ok(())
            }
        }
    }

    fn link_all_threads(&mut self) {
        for i in 0..self.mail_info_array.len() {
            crate::thread::link_new_mail(&mut self.mail_info_array, i);
        }
    }

    // ---- queries ------------------------------------------------------

    pub fn number_of_mails(&self) -> i32 {
        self.mail_info_array.len() as i32 + self.pending_mail_info_array.len() as i32
    }

    pub fn unread_count(&self) -> i32 {
        self.unread_mails
    }

    pub fn new_count(&self) -> i32 {
        self.new_mails
    }

    pub fn size_of_mails(&self) -> u64 {
        self.mail_info_array
            .iter()
            .chain(self.pending_mail_info_array.iter())
            .map(|m| m.size as u64)
            .sum()
    }

    pub fn mails(&self) -> &[MailInfo] {
        &self.mail_info_array
    }

    pub fn pending_mails(&self) -> &[MailInfo] {
        &self.pending_mail_info_array
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<&MailInfo> {
        self.mail_info_array
            .iter()
            .chain(self.pending_mail_info_array.iter())
            .find(|m| m.filename.eq_ignore_ascii_case(filename))
    }

    /// Find by IMAP UID: the numeric prefix of the filename up to `.` or
    /// end-of-string must equal `uid` (spec §6).
    pub fn find_by_uid(&self, uid: u64) -> Option<&MailInfo> {
        self.mail_info_array.iter().find(|m| filename_uid(&m.filename) == Some(uid))
    }

    pub fn find_by_position(&self, pos: usize) -> Option<&MailInfo> {
        if let Some(sorted) = &self.sorted_mail_info_array {
            sorted.get(pos).and_then(|&i| self.mail_info_array.get(i))
        } else {
            self.mail_info_array.get(pos)
        }
    }

    pub fn next_by_filename(&self, filename: &str) -> Option<&MailInfo> {
        let idx = self.index_of_filename(filename)?;
        self.view_order().get(self.position_of(idx)? + 1).and_then(|&i| self.mail_info_array.get(i))
    }

    pub fn prev_by_filename(&self, filename: &str) -> Option<&MailInfo> {
        let idx = self.index_of_filename(filename)?;
        let pos = self.position_of(idx)?;
        if pos == 0 {
            return None;
        }
        self.view_order().get(pos - 1).and_then(|&i| self.mail_info_array.get(i))
    }

    /// First unread, or (in an outgoing folder) first hold, or else the
    /// very first mail (spec §4.4 `best_to_select`).
    pub fn best_to_select(&self) -> Option<&MailInfo> {
        if self.special == FolderSpecial::Outgoing {
            if let Some(m) = self.mail_info_array.iter().find(|m| m.status.kind == StatusKind::Hold) {
                return Some(m);
            }
        }
        self.mail_info_array
            .iter()
            .find(|m| m.status.kind == StatusKind::Unread)
            .or_else(|| self.mail_info_array.first())
    }

    /// Advance `cursor` and return the mail-info at the view position it
    /// held before advancing, or `None` at the end (restartable by
    /// resetting the cursor to zero, spec §9).
    pub fn iterate(&self, cursor: &mut Cursor) -> Option<&MailInfo> {
        let order = self.view_order();
        let item = order.get(cursor.0).and_then(|&i| self.mail_info_array.get(i));
        if item.is_some() {
            cursor.0 += 1;
        }
        item
    }

    fn index_of_filename(&self, filename: &str) -> Option<usize> {
        self.mail_info_array.iter().position(|m| m.filename.eq_ignore_ascii_case(filename))
    }

    fn position_of(&self, idx: usize) -> Option<usize> {
        if let Some(sorted) = &self.sorted_mail_info_array {
            sorted.iter().position(|&i| i == idx)
        } else {
            Some(idx)
        }
    }

    fn view_order(&self) -> Vec<usize> {
        match &self.sorted_mail_info_array {
            Some(sorted) => sorted.clone(),
            None => (0..self.mail_info_array.len()).collect(),
        }
    }

    /// Recompute the sorted view if one has been requested but is stale.
    /// Lazy per spec §4.3 "Sorting is lazy".
    pub fn ensure_sorted(&mut self) {
        if self.sorted_mail_info_array.is_some() {
            return;
        }
        self.recompute_sorted_view();
    }

    fn recompute_sorted_view(&mut self) {
        let sorter = self.sorter();
        let mut order: Vec<usize> = (0..self.mail_info_array.len()).collect();
        order.sort_by(|&a, &b| sorter.compare(&self.mail_info_array[a], &self.mail_info_array[b]));
        self.sorted_mail_info_array = Some(order);
    }

    pub fn request_sorted_view(&mut self) {
        self.recompute_sorted_view();
    }

    pub fn set_primary_sort(&mut self, spec: SortSpec) {
        self.primary_sort = spec;
        self.sorted_mail_info_array = None;
    }

    pub fn set_secondary_sort(&mut self, spec: Option<SortSpec>) {
        self.secondary_sort = spec;
        self.sorted_mail_info_array = None;
    }

    // ---- mutation -------------------------------------------------

    /// Add `mail` to the folder (spec §4.4 "Add algorithm").
    pub fn add_mail(&mut self, mail: MailInfo, sort: AddSort) -> Result<(), FolderError> {
        if !self.mail_infos_loaded {
            if self.num_index_mails == -1 {
                // No index yet: drop silently.
                return Ok(());
            }
            let was_empty = self.pending_mail_info_array.is_empty();
            if mail.is_new() {
                self.new_mails += 1;
            }
            if mail.status.kind == StatusKind::Unread {
                self.unread_mails += 1;
            }
            self.num_index_mails += 1;
            self.pending_mail_info_array.push(mail);
            if was_empty {
                if let Some(path) = self.index_path() {
                    let _ = codec::mark_pending(&path);
                }
            }
            return Ok(());
        }

        match sort {
            AddSort::Destructive => self.sorted_mail_info_array = None,
            AddSort::Sorted => { /* recomputed below if a view exists */ }
        }
        self.index_uptodate = false;
        if let Some(path) = self.index_path() {
            let _ = fs::remove_file(&path);
        }

        let mut mail = mail;
        if !mail.message_id.is_empty()
            && self
                .mail_info_array
                .iter()
                .any(|m| m.message_id.eq_ignore_ascii_case(&mail.message_id))
        {
            // DuplicateMessageId: blank the incoming id and accept.
            mail.message_id.clear();
        }

        if mail.is_new() {
            self.new_mails += 1;
        }
        if mail.status.kind == StatusKind::Unread {
            self.unread_mails += 1;
        }

        let new_idx = self.mail_info_array.len();
        self.mail_info_array.push(mail);

        if sort == AddSort::Sorted {
            if let Some(sorted) = self.sorted_mail_info_array.take() {
                let sorter = self.sorter();
                let mut sorted = sorted;
                let pos = sorted.partition_point(|&i| {
                    sorter.compare(&self.mail_info_array[i], &self.mail_info_array[new_idx]) != std::cmp::Ordering::Greater
                });
                sorted.insert(pos, new_idx);
                self.sorted_mail_info_array = Some(sorted);
            }
        }

        crate::thread::link_new_mail(&mut self.mail_info_array, new_idx);
        Ok(())
    }

    /// Remove `filename` from the folder (spec §4.4 "Remove algorithm").
    pub fn remove_mail(&mut self, filename: &str) -> Result<Option<MailInfo>, FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Ok(None);
        };

        crate::thread::unlink_mail(&mut self.mail_info_array, idx);

        let removed = self.mail_info_array.remove(idx);
        crate::thread::reindex_after_removal(&mut self.mail_info_array, idx);
        self.sorted_mail_info_array = None;
        self.index_uptodate = false;
        if let Some(path) = self.index_path() {
            let _ = fs::remove_file(&path);
        }

        if removed.is_new() {
            self.new_mails = (self.new_mails - 1).max(0);
        }
        if removed.status.kind == StatusKind::Unread {
            self.unread_mails = (self.unread_mails - 1).max(0);
        }
        self.num_index_mails = (self.num_index_mails - 1).max(0);

        Ok(Some(removed))
    }

    pub fn replace_mail(&mut self, old_filename: &str, new_mail: MailInfo) -> Result<(), FolderError> {
        self.remove_mail(old_filename)?;
        self.add_mail(new_mail, AddSort::Destructive)
    }

    /// Change `filename`'s status, renaming its file on disk (spec §4.4
    /// "Status change").
    pub fn set_status(&mut self, filename: &str, new_status: Status) -> Result<String, FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Err(FolderError::RenameCollision {
                from: filename.into(),
                to: filename.into(),
            });
        };

        let old_kind = self.mail_info_array[idx].status.kind;
        let new_kind = new_status.kind;
        if old_kind == StatusKind::Unread && new_kind != StatusKind::Unread {
            self.unread_mails = (self.unread_mails - 1).max(0);
        } else if old_kind != StatusKind::Unread && new_kind == StatusKind::Unread {
            self.unread_mails += 1;
        }
        if self.mail_info_array[idx].is_new() {
            self.new_mails = (self.new_mails - 1).max(0);
        }
        self.mail_info_array[idx].flags.remove(crate::mail_info::MailFlags::NEW);

        let new_name = self.rename_with_collision_retry(filename, new_status)?;
        self.mail_info_array[idx].filename = new_name.clone();
        self.mail_info_array[idx].status = new_status;

        self.index_uptodate = false;
        if let Some(path) = self.index_path() {
            let _ = fs::remove_file(&path);
        }

        Ok(new_name)
    }

    pub fn set_flags(&mut self, filename: &str, flags: crate::mail_info::MailFlags) -> Result<(), FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Ok(());
        };
        self.mail_info_array[idx].flags = flags;
        self.index_uptodate = false;
        Ok(())
    }

    /// IMAP-only: mark a mail deleted/undeleted by renaming its filename
    /// between its status tag and the `d`/`D` shadow tag (C12).
    pub fn mark_deleted(&mut self, filename: &str) -> Result<String, FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Err(FolderError::MoveFailed(filename.into()));
        };
        let marked = self.mail_info_array[idx].status.marked;
        let new_name = filename::rename_for_imap_deleted(filename, marked);
        self.do_rename(filename, &new_name)?;
        self.mail_info_array[idx].filename = new_name.clone();
        Ok(new_name)
    }

    pub fn mark_undeleted(&mut self, filename: &str) -> Result<String, FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Err(FolderError::MoveFailed(filename.into()));
        };
        let status = self.mail_info_array[idx].status;
        let new_name = filename::rename_for(filename, status);
        self.do_rename(filename, &new_name)?;
        self.mail_info_array[idx].filename = new_name.clone();
        Ok(new_name)
    }

    fn rename_with_collision_retry(&self, old: &str, status: Status) -> Result<String, FolderError> {
        let desired = filename::rename_for(old, status);
        match self.do_rename(old, &desired) {
            Ok(()) => Ok(desired),
            Err(_) => {
                let fresh = filename::new_name(status);
                self.do_rename(old, &fresh)?;
                Ok(fresh)
            }
        }
    }

    fn do_rename(&self, old: &str, new: &str) -> Result<(), FolderError> {
        let Some(dir) = &self.path else {
            return Ok(());
        };
        let old_path = dir.join(old);
        let new_path = dir.join(new);
        if new_path.exists() {
            return Err(FolderError::RenameCollision {
                from: old_path,
                to: new_path,
            });
        }
        if old_path.exists() {
            fs::rename(&old_path, &new_path)?;
        }
        Ok(())
    }

    /// Move `filename` into `dest`, array-of-mails aware: retries with a
    /// fresh unique name on collision; forces `SENT -> WAITSEND` when
    /// moving into an outgoing folder (spec §4.4 "Move between folders").
    pub fn move_mail_into(&mut self, filename: &str, dest: &mut Folder) -> Result<(), FolderError> {
        let Some(idx) = self.index_of_filename(filename) else {
            return Err(FolderError::MoveFailed(filename.into()));
        };
        let mut mail = self.mail_info_array[idx].clone();

        if dest.special == FolderSpecial::Outgoing && mail.status.kind == StatusKind::Sent {
            let new_status = Status {
                kind: StatusKind::WaitSend,
                marked: mail.status.marked,
            };
            let renamed = filename::rename_for(&mail.filename, new_status);
            if let (Some(src_dir), Some(_)) = (&self.path, &dest.path) {
                let _ = fs::rename(src_dir.join(&mail.filename), src_dir.join(&renamed));
            }
            mail.filename = renamed;
            mail.status = new_status;
        }

        if let (Some(src_dir), Some(dst_dir)) = (&self.path, &dest.path) {
            let src_path = src_dir.join(&mail.filename);
            let dst_path = dst_dir.join(&mail.filename);
            if dst_path.exists() {
                let fresh = filename::new_name(mail.status);
                fs::rename(&src_path, dst_dir.join(&fresh)).map_err(|_| {
                    FolderError::MoveFailed(src_path.clone())
                })?;
                mail.filename = fresh;
            } else if src_path.exists() {
                fs::rename(&src_path, &dst_path).map_err(|_| FolderError::MoveFailed(src_path.clone()))?;
            }
        }

        self.remove_mail(filename)?;
        dest.add_mail(mail, AddSort::Destructive)?;
        Ok(())
    }

    // ---- persistence ------------------------------------------------

    /// Flush pending/dirty state to the on-disk index (spec §4.1 "Append
    /// mode" / §4.4).
    pub fn save_index(&mut self) -> Result<(), FolderError> {
        let Some(path) = self.index_path() else {
            return Ok(());
        };

        if self.pending_mail_info_array.is_empty() && (!self.mail_infos_loaded || self.index_uptodate) {
            return Ok(());
        }

        if !self.pending_mail_info_array.is_empty() {
            let pending = std::mem::take(&mut self.pending_mail_info_array);
            if path.exists() {
                codec::append_pending(&path, self.number_of_mails(), self.unread_mails, &pending)?;
            } else {
                codec::save(&path, &pending, self.unread_mails)?;
            }
            for mail in pending {
                let idx = self.mail_info_array.len();
                self.mail_info_array.push(mail);
                crate::thread::link_new_mail(&mut self.mail_info_array, idx);
            }
            self.sorted_mail_info_array = None;
        } else {
            codec::save(&path, &self.mail_info_array, self.unread_mails)?;
        }

        self.index_uptodate = true;
        Ok(())
    }

    pub fn delete_all_mails(&mut self) -> Result<(), FolderError> {
        if let Some(dir) = &self.path {
            for mail in self.mail_info_array.iter().chain(self.pending_mail_info_array.iter()) {
                let _ = fs::remove_file(dir.join(&mail.filename));
            }
        }
        self.mail_info_array.clear();
        self.pending_mail_info_array.clear();
        self.sorted_mail_info_array = None;
        self.num_index_mails = 0;
        self.unread_mails = 0;
        self.new_mails = 0;
        self.index_uptodate = false;
        if let Some(path) = self.index_path() {
            let _ = fs::remove_file(path);
        }
        Ok(())
    }

    /// Rebuild the folder from its directory, discarding whatever index
    /// state it had (spec §4.4 "Rescan").
    pub fn rescan(&mut self) -> Result<(), FolderError> {
        let Some(dir) = self.path.clone() else {
            return Err(FolderError::IsGroupFolder(PathBuf::new()));
        };

        self.mail_info_array.clear();
        self.pending_mail_info_array.clear();
        self.sorted_mail_info_array = None;
        self.unread_mails = 0;
        self.new_mails = 0;
        self.mail_infos_loaded = true;

        let entries = fs::read_dir(&dir).map_err(|_| FolderError::RescanFailed(dir.clone()))?;
        let mut names: Vec<String> = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('.') {
                continue;
            }
            names.push(file_name.into_owned());
        }
        names.sort();

        for name in names {
            let status = filename::status_of(&name).unwrap_or(Status::new(StatusKind::Unread));
            let mail = MailInfo::new(name, status);
            self.add_mail(mail, AddSort::Destructive)?;
        }

        self.index_uptodate = false;
        self.num_index_mails = self.mail_info_array.len() as i32;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_attributes(
        &mut self,
        name: impl Into<String>,
        path: Option<PathBuf>,
        kind: FolderKind,
        primary_sort: SortSpec,
        secondary_sort: Option<SortSpec>,
        default_to: Option<String>,
        default_from: Option<String>,
        default_reply_to: Option<String>,
        default_signature: Option<String>,
    ) {
        self.name = name.into();
        self.path = path;
        self.kind = kind;
        self.primary_sort = primary_sort;
        self.secondary_sort = secondary_sort;
        self.default_to = default_to;
        self.default_from = default_from;
        self.default_reply_to = default_reply_to;
        self.default_signature = default_signature;
        self.sorted_mail_info_array = None;
    }
}

fn filename_uid(filename: &str) -> Option<u64> {
    let rest = filename.get(1..)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_folder(dir: &Path) -> Folder {
        let mut f = Folder::new("Inbox", Some(dir.to_path_buf()), FolderSpecial::Incoming, FolderKind::Recv);
        f.open().unwrap();
        f
    }

    #[test]
    fn empty_folder_has_zeroed_counters_and_empty_index() {
        let dir = tempdir().unwrap();
        let mut f = open_folder(dir.path());
        assert_eq!(f.number_of_mails(), 0);
        assert_eq!(f.unread_count(), 0);
        f.save_index().unwrap();
        let index_path = dir.path().join("Inbox.index");
        assert_eq!(fs::metadata(&index_path).unwrap().len(), 20);
    }

    #[test]
    fn pending_then_load_spec_scenario_1() {
        let dir = tempdir().unwrap();
        // Seed an index with 3 mails but don't load it fully.
        let seed: Vec<MailInfo> = (0..3)
            .map(|i| MailInfo::new(format!("u000{i}.msg"), Status::new(StatusKind::Unread)))
            .collect();
        let index_path = dir.path().join("Inbox.index");
        codec::save(&index_path, &seed, 3).unwrap();

        let mut f = Folder::new("Inbox", Some(dir.path().to_path_buf()), FolderSpecial::Incoming, FolderKind::Recv);
        f.open_counts_only().unwrap();
        assert_eq!(f.num_index_mails, 3);
        assert!(!f.mail_infos_loaded);

        let m4 = MailInfo::new("u0099.msg", Status::new(StatusKind::Unread));
        f.add_mail(m4, AddSort::Destructive).unwrap();
        assert_eq!(f.unread_count(), 4);

        let loaded_header = codec::load(&index_path).unwrap().header;
        assert!(loaded_header.pending);

        f.save_index().unwrap();
        assert_eq!(f.mails().len(), 4);
        let reloaded = codec::load(&index_path).unwrap();
        assert!(!reloaded.header.pending);
    }

    /// Same scenario as `pending_then_load_spec_scenario_1`, but the "load
    /// fully" step re-invokes `open()` directly (as a transport thread
    /// upgrading a counts-only folder to a fully-loaded one would) instead
    /// of going through `save_index()` first.
    #[test]
    fn reopening_a_counts_only_folder_with_pending_mails_merges_them() {
        let dir = tempdir().unwrap();
        let seed: Vec<MailInfo> = (0..3)
            .map(|i| MailInfo::new(format!("u000{i}.msg"), Status::new(StatusKind::Unread)))
            .collect();
        let index_path = dir.path().join("Inbox.index");
        codec::save(&index_path, &seed, 3).unwrap();

        let mut f = Folder::new("Inbox", Some(dir.path().to_path_buf()), FolderSpecial::Incoming, FolderKind::Recv);
        f.open_counts_only().unwrap();

        let m4 = MailInfo::new("u0099.msg", Status::new(StatusKind::Unread));
        f.add_mail(m4, AddSort::Destructive).unwrap();
        assert_eq!(f.unread_count(), 4);

        f.open().unwrap();
        assert!(f.mail_infos_loaded);
        assert_eq!(f.mails().len(), 4);
        assert_eq!(f.unread_count(), 4);
        assert_eq!(f.number_of_mails(), 4);
        assert!(f.pending_mails().is_empty());
        assert!(f.find_by_filename("u0099.msg").is_some());
    }

    #[test]
    fn status_change_rename_spec_scenario_2() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("u0005.msg"), b"body").unwrap();
        let mut f = open_folder(dir.path());
        assert_eq!(f.mails().len(), 1);
        assert_eq!(f.unread_count(), 1);

        let new_name = f.set_status("u0005.msg", Status::new(StatusKind::Read)).unwrap();
        assert!(new_name.starts_with('o'));
        assert_eq!(f.unread_count(), 0);
        assert!(!f.index_uptodate);
        assert!(dir.path().join(&new_name).exists());
    }

    #[test]
    fn move_sent_to_outgoing_forces_waitsend_spec_scenario_6() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();
        fs::write(src_dir.path().join("s0001.msg"), b"body").unwrap();

        let mut src = open_folder(src_dir.path());
        let mut dst = Folder::new(
            "Outgoing",
            Some(dst_dir.path().to_path_buf()),
            FolderSpecial::Outgoing,
            FolderKind::Send,
        );
        dst.open().unwrap();

        src.move_mail_into("s0001.msg", &mut dst).unwrap();
        assert_eq!(src.mails().len(), 0);
        assert_eq!(dst.mails().len(), 1);
        assert_eq!(dst.mails()[0].status.kind, StatusKind::WaitSend);
        assert!(dst.mails()[0].filename.starts_with('w'));
    }

    #[test]
    fn filename_collision_on_move_gets_distinct_names() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();
        fs::write(src_dir.path().join("u0001.msg"), b"one").unwrap();
        fs::write(dst_dir.path().join("u0001.msg"), b"two").unwrap();

        let mut src = open_folder(src_dir.path());
        let mut dst = open_folder(dst_dir.path());
        src.move_mail_into("u0001.msg", &mut dst).unwrap();

        assert_eq!(dst.mails().len(), 2);
        let names: std::collections::HashSet<_> = dst.mails().iter().map(|m| m.filename.clone()).collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn unclean_shutdown_forces_rescan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("u0001.msg"), b"body").unwrap();
        let index_path = dir.path().join("Inbox.index");
        codec::save(&index_path, &[], 0).unwrap();
        codec::mark_pending(&index_path).unwrap();

        let mut f = Folder::new("Inbox", Some(dir.path().to_path_buf()), FolderSpecial::Incoming, FolderKind::Recv);
        f.open().unwrap();
        assert_eq!(f.mails().len(), 1);
    }

    #[test]
    fn remove_restores_counters_spec_invariant() {
        let dir = tempdir().unwrap();
        let mut f = open_folder(dir.path());
        let m = MailInfo::new("u0001.msg", Status::new(StatusKind::Unread));
        f.add_mail(m, AddSort::Destructive).unwrap();
        f.request_sorted_view();
        let before_unread = f.unread_count();
        f.remove_mail("u0001.msg").unwrap();
        assert_eq!(f.unread_count(), before_unread - 1);
        assert_eq!(f.mails().len(), 0);
    }
}
