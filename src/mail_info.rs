//! In-memory summary of one mail (C1).
//!
//! `MailInfo` is a value record produced by the index loader, a directory
//! rescan, or the transport layer handing the core a freshly arrived mail.
//! It never owns the mail body; header parsing and MIME decoding are the
//! job of an external collaborator (see spec §1 "Deliberately out of scope").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recipient: display name plus address, as they would appear on
/// a `To:`/`Cc:` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub realname: String,
    pub email: String,
}

impl Recipient {
    pub fn new(realname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            realname: realname.into(),
            email: email.into(),
        }
    }
}

/// The kind of status a mail can carry, independent of the `MARKED` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    Unread,
    Read,
    WaitSend,
    Sent,
    Replied,
    Forward,
    ReplForw,
    Hold,
    Error,
}

impl StatusKind {
    /// Integer ordinal used by the `status` sort field (mirrors the C
    /// enum ordering in `original_source/folder.c`'s `MAIL_STATUS_*`
    /// constants, which the sorter compares numerically).
    pub fn ordinal(self) -> i32 {
        match self {
            StatusKind::Unread => 0,
            StatusKind::Read => 1,
            StatusKind::WaitSend => 2,
            StatusKind::Sent => 3,
            StatusKind::Replied => 4,
            StatusKind::Forward => 5,
            StatusKind::ReplForw => 6,
            StatusKind::Hold => 7,
            StatusKind::Error => 8,
        }
    }
}

/// Status of a mail: a kind plus an independent `marked` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub marked: bool,
}

impl Status {
    pub fn new(kind: StatusKind) -> Self {
        Self {
            kind,
            marked: false,
        }
    }

    pub fn marked(kind: StatusKind) -> Self {
        Self { kind, marked: true }
    }
}

bitflags::bitflags! {
    /// Per-mail flags, independent of status (spec §3).
    #[derive(Serialize, Deserialize)]
    pub struct MailFlags: u32 {
        const NEW               = 0b0000_0001;
        const ATTACH             = 0b0000_0010;
        const AUTOSPAM           = 0b0000_0100;
        const FROM_ADDR_ASCII7   = 0b0000_1000;
        const FROM_ASCII7        = 0b0001_0000;
        const SUBJECT_ASCII7     = 0b0010_0000;
    }
}

impl Default for MailFlags {
    fn default() -> Self {
        MailFlags::empty()
    }
}

/// In-memory summary of one mail (C1).
///
/// Threading pointers (`sub_thread_mail`, `next_thread_mail`) are indices
/// into the owning folder's `mail_info_array`, not pointers — see design
/// note "Cyclic structures" in spec §9: a relocation on remove only has to
/// fix indices, never chase raw pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailInfo {
    pub filename: String,
    pub subject: String,
    pub from_phrase: String,
    pub from_addr: String,
    pub to_list: Vec<Recipient>,
    pub cc_list: Vec<Recipient>,
    pub to_phrase: String,
    pub to_addr: String,
    pub reply_addr: String,
    pub pop3_server: String,
    pub message_id: String,
    pub message_reply_id: String,
    pub size: u32,
    pub seconds: i64,
    pub received: i64,
    pub status: Status,
    pub flags: MailFlags,

    /// Index of the first reply in this folder's array, if any.
    pub sub_thread_mail: Option<usize>,
    /// Index of the next sibling in the reply chain.
    pub next_thread_mail: Option<usize>,
    pub child_mail: bool,
}

impl MailInfo {
    /// Build a bare mail-info with default/empty fields except `filename`,
    /// `subject`, `from_addr`, `message_id`, and `status`.
    pub fn new(filename: impl Into<String>, status: Status) -> Self {
        Self {
            filename: filename.into(),
            subject: String::new(),
            from_phrase: String::new(),
            from_addr: String::new(),
            to_list: Vec::new(),
            cc_list: Vec::new(),
            to_phrase: String::new(),
            to_addr: String::new(),
            reply_addr: String::new(),
            pop3_server: String::new(),
            message_id: String::new(),
            message_reply_id: String::new(),
            size: 0,
            seconds: 0,
            received: 0,
            status,
            flags: MailFlags::empty(),
            sub_thread_mail: None,
            next_thread_mail: None,
            child_mail: false,
        }
    }

    /// `from_phrase || from_addr`, used by the `from_or_to` sort field on
    /// receive-type folders.
    pub fn from_display(&self) -> String {
        if !self.from_phrase.is_empty() {
            self.from_phrase.clone()
        } else {
            self.from_addr.clone()
        }
    }

    /// `to_phrase || to_addr`, used by the `from_or_to` sort field on
    /// send-type folders.
    pub fn to_display(&self) -> String {
        if !self.to_phrase.is_empty() {
            self.to_phrase.clone()
        } else {
            self.to_addr.clone()
        }
    }

    pub fn is_new(&self) -> bool {
        self.flags.contains(MailFlags::NEW)
    }

    pub fn has_attachment(&self) -> bool {
        self.flags.contains(MailFlags::ATTACH)
    }

    /// Receive time as a UTC timestamp, for display/comparison convenience.
    pub fn received_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.received, 0).unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
    }

    /// Send time as a UTC timestamp.
    pub fn sent_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.seconds, 0).unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_display_prefers_phrase() {
        let mut m = MailInfo::new("u0001.msg", Status::new(StatusKind::Unread));
        m.from_addr = "alice@example.com".into();
        assert_eq!(m.from_display(), "alice@example.com");
        m.from_phrase = "Alice".into();
        assert_eq!(m.from_display(), "Alice");
    }

    #[test]
    fn status_kind_ordinal_is_monotonic_with_table() {
        assert!(StatusKind::Unread.ordinal() < StatusKind::Read.ordinal());
        assert!(StatusKind::Hold.ordinal() < StatusKind::Error.ordinal());
    }

    #[test]
    fn mail_info_round_trips_through_json_snapshot() {
        let mut m = MailInfo::new("u0007.msg", Status::marked(StatusKind::Read));
        m.subject = "quarterly report".into();
        m.from_addr = "alice@example.com".into();
        m.to_list.push(Recipient::new("Bob", "bob@example.com"));
        m.flags = MailFlags::ATTACH | MailFlags::NEW;
        m.sub_thread_mail = Some(2);

        let json = serde_json::to_string(&m).unwrap();
        let restored: MailInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, m);
    }
}
