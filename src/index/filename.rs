//! Filename-status codec (C3): the bijection between a mail's on-disk
//! filename prefix and its status flags.
//!
//! The codec is the single authority for this mapping (spec §9,
//! "Side-channel signaling via filename") — no other module is allowed to
//! synthesize or parse a status tag character directly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::mail_info::{Status, StatusKind};

/// Tag assigned to IMAP-deleted shadow files (spec §4.2). Not a real
/// `StatusKind`; surfaced separately since a mail can carry this tag
/// without otherwise changing status.
pub const IMAP_DELETED_TAG_LOWER: char = 'd';
pub const IMAP_DELETED_TAG_UPPER: char = 'D';

fn tag_for(kind: StatusKind) -> char {
    match kind {
        StatusKind::Unread => 'u',
        StatusKind::Read => 'o',
        StatusKind::WaitSend => 'w',
        StatusKind::Sent => 's',
        StatusKind::Replied => 'r',
        StatusKind::Forward => 'f',
        StatusKind::ReplForw => 'f', // REPLFORW shares FORWARD's on-disk tag; distinguished in-memory only
        StatusKind::Hold => 'h',
        StatusKind::Error => 'e',
    }
}

fn kind_for_tag(tag: char) -> Option<StatusKind> {
    match tag.to_ascii_lowercase() {
        'u' => Some(StatusKind::Unread),
        'o' => Some(StatusKind::Read),
        'w' => Some(StatusKind::WaitSend),
        's' => Some(StatusKind::Sent),
        'r' => Some(StatusKind::Replied),
        'f' => Some(StatusKind::Forward),
        'h' => Some(StatusKind::Hold),
        'e' => Some(StatusKind::Error),
        _ => None,
    }
}

/// Status recovered from a filename's leading tag character, or `None` if
/// the filename begins with an unrecognized or `d`/`D` (IMAP-deleted
/// shadow) tag.
pub fn status_of(filename: &str) -> Option<Status> {
    let tag = filename.chars().next()?;
    let kind = kind_for_tag(tag)?;
    Some(Status {
        kind,
        marked: tag.is_ascii_uppercase(),
    })
}

/// True if `filename` carries the IMAP-deleted shadow tag (`d`/`D`).
pub fn is_imap_deleted_tag(filename: &str) -> bool {
    matches!(
        filename.chars().next(),
        Some(IMAP_DELETED_TAG_LOWER) | Some(IMAP_DELETED_TAG_UPPER)
    )
}

/// Desired new basename for `filename` under `new_status`. Only the
/// leading tag character changes; the rest of the basename (sequence
/// number, `M` marker, suffix) is preserved verbatim.
///
/// Callers must attempt a rename to this name and, on collision, fall
/// back to [`new_name`].
pub fn rename_for(filename: &str, new_status: Status) -> String {
    let mut tag = tag_for(new_status.kind);
    if new_status.marked {
        tag = tag.to_ascii_uppercase();
    }
    match filename.char_indices().nth(1) {
        Some((idx, _)) => format!("{tag}{}", &filename[idx..]),
        None => tag.to_string(),
    }
}

/// Rename `filename` to the IMAP-deleted shadow tag, preserving `marked`.
pub fn rename_for_imap_deleted(filename: &str, marked: bool) -> String {
    let tag = if marked {
        IMAP_DELETED_TAG_UPPER
    } else {
        IMAP_DELETED_TAG_LOWER
    };
    match filename.char_indices().nth(1) {
        Some((idx, _)) => format!("{tag}{}", &filename[idx..]),
        None => tag.to_string(),
    }
}

static COLLISION_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Produce a fresh, collision-free basename for `status` (spec §9,
/// "Filename-collision rename loop"): `<tag><epoch-seconds>_<counter>.msg`.
/// The counter is process-wide and monotonic so two collisions within the
/// same wall-clock second still disambiguate.
pub fn new_name(status: Status) -> String {
    let mut tag = tag_for(status.kind);
    if status.marked {
        tag = tag.to_ascii_uppercase();
    }
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let counter = COLLISION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{tag}{secs}_{counter}.msg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_status() {
        for kind in [
            StatusKind::Unread,
            StatusKind::Read,
            StatusKind::WaitSend,
            StatusKind::Sent,
            StatusKind::Replied,
            StatusKind::Forward,
            StatusKind::Hold,
            StatusKind::Error,
        ] {
            let status = Status::new(kind);
            let renamed = rename_for("u0001.msg", status);
            assert_eq!(status_of(&renamed).unwrap().kind, kind);

            let marked = Status::marked(kind);
            let renamed_marked = rename_for("u0001.msg", marked);
            assert!(status_of(&renamed_marked).unwrap().marked);
        }
    }

    #[test]
    fn uppercase_sets_marked() {
        let s = status_of("U0005.msg").unwrap();
        assert_eq!(s.kind, StatusKind::Unread);
        assert!(s.marked);
    }

    #[test]
    fn status_change_rename_preserves_suffix() {
        let renamed = rename_for("u0005.msg", Status::new(StatusKind::Read));
        assert_eq!(renamed, "o0005.msg");
        assert_eq!(status_of(&renamed).unwrap().kind, StatusKind::Read);
    }

    #[test]
    fn new_name_is_fresh_each_call() {
        let a = new_name(Status::new(StatusKind::Unread));
        let b = new_name(Status::new(StatusKind::Unread));
        assert_ne!(a, b);
        assert!(a.starts_with('u'));
    }

    #[test]
    fn imap_deleted_tag_detected() {
        assert!(is_imap_deleted_tag("d0001.msg"));
        assert!(is_imap_deleted_tag("D0001.msg"));
        assert!(!is_imap_deleted_tag("u0001.msg"));
    }
}
