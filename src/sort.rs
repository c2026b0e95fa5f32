//! Sorter (C6): primary/secondary comparator stack with per-field rules
//! and tie-breaks (spec §4.3).

use std::cmp::Ordering;

use crate::mail_info::MailInfo;

/// A sortable field, as named in the folder's `primary_sort`/
/// `secondary_sort` and the `.config` file's `PrimarySort`/`SecondarySort`
/// keys (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Status,
    FromOrTo,
    Subject,
    Reply,
    Date,
    Size,
    Filename,
    Pop3,
    Received,
    Thread,
}

/// One component of the sort: a field plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub reverse: bool,
}

impl SortSpec {
    pub fn new(field: SortField, reverse: bool) -> Self {
        Self { field, reverse }
    }
}

/// Whether a folder is of receive or send type, which decides which
/// phrase/address pair `from_or_to` compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Receive,
    Send,
}

/// Strip bracketed `[...]` groups, leading whitespace, reply/forward
/// prefixes (`Re:`, `AW:`, `Fwd:`, `Re[12]:`), and trailing smiley-like
/// `-`/`)` sequences, per spec §Glossary "Compare subject".
///
/// Grounded in `mail_get_compare_subject` (`original_source/folder.c`)
/// and mirrored by the thread linker's subject-grouping hint.
pub fn normalize_subject(subject: &str) -> String {
    let mut s = subject.trim_start();
    loop {
        let before = s;
        s = s.trim_start();

        if let Some(rest) = s.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                s = rest[end + 1..].trim_start();
                continue;
            }
        }

        // `XYZ:` / `XYZ[n]:` prefixes recognized within the first ten
        // characters (e.g. `Re:`, `AW:`, `Fwd:`, `Re[12]:`).
        if let Some(colon) = s.get(..10.min(s.len())).and_then(|head| head.find(':')) {
            let head = &s[..colon];
            let tag = head.trim_end_matches(|c: char| c == ']' || c.is_ascii_digit() || c == '[');
            if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphabetic()) {
                s = s[colon + 1..].trim_start();
                continue;
            }
        }

        if before == s {
            break;
        }
    }

    let trimmed_end = s.trim_end();
    let mut end = trimmed_end.len();
    let bytes = trimmed_end.as_bytes();
    while end > 0 && matches!(bytes[end - 1], b'-' | b')') {
        end -= 1;
    }
    trimmed_end[..end].trim_end().to_string()
}

fn compare_status(a: &MailInfo, b: &MailInfo) -> Ordering {
    match (a.is_new(), b.is_new()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.status.kind.ordinal().cmp(&b.status.kind.ordinal()),
    }
}

fn compare_from_or_to(a: &MailInfo, b: &MailInfo, kind: FolderKind) -> Ordering {
    match kind {
        FolderKind::Receive => a
            .from_display()
            .to_lowercase()
            .cmp(&b.from_display().to_lowercase()),
        FolderKind::Send => a
            .to_display()
            .to_lowercase()
            .cmp(&b.to_display().to_lowercase()),
    }
}

fn compare_field(field: SortField, a: &MailInfo, b: &MailInfo, folder_kind: FolderKind) -> Ordering {
    match field {
        SortField::Status => compare_status(a, b),
        SortField::FromOrTo => compare_from_or_to(a, b, folder_kind),
        SortField::Subject => {
            normalize_subject(&a.subject)
                .to_lowercase()
                .cmp(&normalize_subject(&b.subject).to_lowercase())
        }
        SortField::Reply => a.reply_addr.to_lowercase().cmp(&b.reply_addr.to_lowercase()),
        SortField::Date => a.seconds.cmp(&b.seconds),
        SortField::Received => a.received.cmp(&b.received),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Filename => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
        SortField::Pop3 => a.pop3_server.to_lowercase().cmp(&b.pop3_server.to_lowercase()),
        // Thread ordering is resolved by the thread linker, not the
        // sorter; mails compare equal here so earlier tie-breaks decide.
        SortField::Thread => Ordering::Equal,
    }
}

/// A primary/secondary comparator pair. If both name the same field, the
/// secondary is dropped (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct Sorter {
    primary: SortSpec,
    secondary: Option<SortSpec>,
    folder_kind: FolderKind,
}

impl Sorter {
    pub fn new(primary: SortSpec, secondary: Option<SortSpec>, folder_kind: FolderKind) -> Self {
        let secondary = match secondary {
            Some(s) if s.field == primary.field => None,
            other => other,
        };
        Self {
            primary,
            secondary,
            folder_kind,
        }
    }

    pub fn compare(&self, a: &MailInfo, b: &MailInfo) -> Ordering {
        let primary = compare_field(self.primary.field, a, b, self.folder_kind);
        let primary = if self.primary.reverse {
            primary.reverse()
        } else {
            primary
        };
        if primary != Ordering::Equal {
            return primary;
        }
        if let Some(secondary) = self.secondary {
            let secondary = compare_field(secondary.field, a, b, self.folder_kind);
            if secondary.reverse {
                secondary.reverse()
            } else {
                secondary
            }
        } else {
            Ordering::Equal
        }
    }

    /// Binary-search `sorted` for the upper bound at which `mail` should
    /// be inserted, preserving stability (spec §4.4 "Add algorithm").
    pub fn upper_bound(&self, sorted: &[MailInfo], mail: &MailInfo) -> usize {
        sorted.partition_point(|m| self.compare(m, mail) != Ordering::Greater)
    }
}
