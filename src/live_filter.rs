//! Live-filter view (C11): a read-only pseudo-folder that filters
//! another folder's mail list on the fly (spec §4.10).

use crate::folder::{Cursor, Folder};
use crate::lock::FolderLockGuard;
use crate::mail_info::MailInfo;

/// A read-only decorator over `source`: iteration skips any mail whose
/// subject, `from_addr`, and `from_phrase` all fail a case-insensitive
/// substring test against the filter string (spec §4.10). Owns no mails
/// itself (spec §9 "Live folder as a view") and holds both its own
/// pseudo-folder's lock and `source`'s lock for its entire lifetime, in
/// that order (spec §5).
pub struct LiveFolder<'a> {
    source: &'a Folder,
    filter: String,
    _view_guard: FolderLockGuard<'a>,
    _source_guard: FolderLockGuard<'a>,
}

impl<'a> LiveFolder<'a> {
    /// Open a live view: `view` is the pseudo-folder entity carrying the
    /// `ref_folder`/`live_filter` linkage (spec §3 "Folder" fields);
    /// `source` is the folder it filters.
    pub fn open(view: &'a Folder, source: &'a Folder) -> Self {
        let view_guard = view.lock();
        let source_guard = source.lock();
        let filter = view.live_filter.clone().unwrap_or_default();
        Self {
            source,
            filter,
            _view_guard: view_guard,
            _source_guard: source_guard,
        }
    }

    fn matches(&self, mail: &MailInfo) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        let needle = self.filter.to_lowercase();
        mail.subject.to_lowercase().contains(&needle)
            || mail.from_addr.to_lowercase().contains(&needle)
            || mail.from_phrase.to_lowercase().contains(&needle)
    }

    /// Forward iteration to `source`, skipping non-matching mails (spec
    /// §4.10). Restartable the same way as the underlying folder's
    /// cursor (spec §9 "Coroutine-like iteration").
    pub fn iterate(&self, cursor: &mut Cursor) -> Option<&MailInfo> {
        loop {
            let mail = self.source.iterate(cursor)?;
            if self.matches(mail) {
                return Some(mail);
            }
        }
    }

    pub fn count(&self) -> usize {
        let mut cursor = Cursor::default();
        let mut count = 0;
        while self.iterate(&mut cursor).is_some() {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::{AddSort, FolderKind, FolderSpecial};
    use crate::mail_info::{Status, StatusKind};

    fn loaded_folder(name: &str) -> Folder {
        let mut f = Folder::new(name, None, FolderSpecial::Incoming, FolderKind::Recv);
        f.mail_infos_loaded = true;
        f
    }

    #[test]
    fn filters_by_substring_across_subject_and_from() {
        let mut source = loaded_folder("Inbox");
        let mut m1 = MailInfo::new("u0001.msg", Status::new(StatusKind::Unread));
        m1.subject = "quarterly report".into();
        m1.from_addr = "alice@example.com".into();
        let mut m2 = MailInfo::new("u0002.msg", Status::new(StatusKind::Unread));
        m2.subject = "lunch plans".into();
        m2.from_addr = "bob@example.com".into();
        let mut m3 = MailInfo::new("u0003.msg", Status::new(StatusKind::Unread));
        m3.subject = "unrelated".into();
        m3.from_phrase = "Reporter Bot".into();
        source.add_mail(m1, AddSort::Destructive).unwrap();
        source.add_mail(m2, AddSort::Destructive).unwrap();
        source.add_mail(m3, AddSort::Destructive).unwrap();

        let mut view = Folder::new("Reports", None, FolderSpecial::No, FolderKind::Recv);
        view.live_filter = Some("report".into());
        let live = LiveFolder::open(&view, &source);

        assert_eq!(live.count(), 2);
    }

    #[test]
    fn empty_filter_passes_everything() {
        let mut source = loaded_folder("Inbox");
        source
            .add_mail(MailInfo::new("u0001.msg", Status::new(StatusKind::Unread)), AddSort::Destructive)
            .unwrap();
        source
            .add_mail(MailInfo::new("u0002.msg", Status::new(StatusKind::Unread)), AddSort::Destructive)
            .unwrap();

        let view = Folder::new("All", None, FolderSpecial::No, FolderKind::Recv);
        let live = LiveFolder::open(&view, &source);
        assert_eq!(live.count(), 2);
    }

    #[test]
    fn cursor_is_restartable() {
        let mut source = loaded_folder("Inbox");
        let mut m1 = MailInfo::new("u0001.msg", Status::new(StatusKind::Unread));
        m1.subject = "match me".into();
        source.add_mail(m1, AddSort::Destructive).unwrap();

        let mut view = Folder::new("Filtered", None, FolderSpecial::No, FolderKind::Recv);
        view.live_filter = Some("match".into());
        let live = LiveFolder::open(&view, &source);

        let mut cursor = Cursor::default();
        assert!(live.iterate(&mut cursor).is_some());
        assert!(live.iterate(&mut cursor).is_none());
        cursor.reset();
        assert!(live.iterate(&mut cursor).is_some());
    }
}
