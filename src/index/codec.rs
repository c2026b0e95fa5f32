//! Index file codec (C2): versioned on-disk serialization of a folder's
//! mail-info list, with a "pending" append mode (spec §4.1).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::index::filename;
use crate::mail_info::{MailFlags, MailInfo, Recipient, Status, StatusKind};

pub const MAGIC: &[u8; 4] = b"SMFI";
pub const VERSION: u32 = 7;
const HEADER_LEN: u64 = 20;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("wrong magic bytes")]
    WrongMagic,

    #[error("unsupported index version {0} (expected {VERSION})")]
    WrongVersion(u32),

    #[error("record count {count} is inconsistent with file size")]
    CountExceedsFile { count: i64 },

    #[error("unclean shutdown: pending flag set with no pending records supplied")]
    UncleanShutdown,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Parsed 20-byte index header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub pending: bool,
    pub num_mails: i32,
    pub unread: i32,
}

/// Result of a full index load.
pub struct LoadedIndex {
    pub header: IndexHeader,
    pub mails: Vec<MailInfo>,
}

fn read_len_prefixed(r: &mut impl Read) -> Result<String, IndexError> {
    let len = r.read_u16::<byteorder::BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_len_prefixed(w: &mut impl Write, s: &str) -> Result<usize, IndexError> {
    let bytes = s.as_bytes();
    let len: u16 = bytes.len().min(u16::MAX as usize) as u16;
    w.write_u16::<byteorder::BigEndian>(len)?;
    w.write_all(&bytes[..len as usize])?;
    Ok(2 + len as usize)
}

fn read_record(r: &mut (impl Read + Seek), record_start: u64) -> Result<MailInfo, IndexError> {
    let num_to = r.read_u32::<NativeEndian>()?;
    let num_cc = r.read_u32::<NativeEndian>()?;
    let subject = read_len_prefixed(r)?;
    let filename = read_len_prefixed(r)?;
    let from_phrase = read_len_prefixed(r)?;
    let from_addr = read_len_prefixed(r)?;

    let mut to_list = Vec::with_capacity(num_to as usize);
    for _ in 0..num_to {
        let realname = read_len_prefixed(r)?;
        let email = read_len_prefixed(r)?;
        to_list.push(Recipient::new(realname, email));
    }
    let mut cc_list = Vec::with_capacity(num_cc as usize);
    for _ in 0..num_cc {
        let realname = read_len_prefixed(r)?;
        let email = read_len_prefixed(r)?;
        cc_list.push(Recipient::new(realname, email));
    }

    let pop3_server = read_len_prefixed(r)?;
    let message_id = read_len_prefixed(r)?;
    let reply_id = read_len_prefixed(r)?;
    let reply_addr = read_len_prefixed(r)?;

    let offset = r.stream_position()? - record_start;
    if offset % 2 == 1 {
        r.seek(SeekFrom::Current(1))?;
    }

    let size = r.read_u32::<NativeEndian>()?;
    let seconds = r.read_u32::<NativeEndian>()? as i64;
    let received = r.read_u32::<NativeEndian>()? as i64;
    let flag_bits = r.read_u32::<NativeEndian>()?;

    // Status is not stored here; the filename tag is the single authority
    // for it (see `index::filename`). An unrecognized tag falls back to
    // unread rather than failing the whole record.
    let status = filename::status_of(&filename).unwrap_or(Status::new(StatusKind::Unread));

    let mut to_phrase = String::new();
    let mut to_addr = String::new();
    if let Some(first) = to_list.first() {
        to_phrase = first.realname.clone();
        to_addr = first.email.clone();
    }

    Ok(MailInfo {
        filename,
        subject,
        from_phrase,
        from_addr,
        to_list,
        cc_list,
        to_phrase,
        to_addr,
        reply_addr,
        pop3_server,
        message_id,
        message_reply_id: reply_id,
        size,
        seconds,
        received,
        status,
        flags: MailFlags::from_bits_truncate(flag_bits),
        sub_thread_mail: None,
        next_thread_mail: None,
        child_mail: false,
    })
}

fn write_record(w: &mut (impl Write + Seek), record_start: u64, mail: &MailInfo) -> Result<(), IndexError> {
    w.write_u32::<NativeEndian>(mail.to_list.len() as u32)?;
    w.write_u32::<NativeEndian>(mail.cc_list.len() as u32)?;
    write_len_prefixed(w, &mail.subject)?;
    write_len_prefixed(w, &mail.filename)?;
    write_len_prefixed(w, &mail.from_phrase)?;
    write_len_prefixed(w, &mail.from_addr)?;
    for r in &mail.to_list {
        write_len_prefixed(w, &r.realname)?;
        write_len_prefixed(w, &r.email)?;
    }
    for r in &mail.cc_list {
        write_len_prefixed(w, &r.realname)?;
        write_len_prefixed(w, &r.email)?;
    }
    write_len_prefixed(w, &mail.pop3_server)?;
    write_len_prefixed(w, &mail.message_id)?;
    write_len_prefixed(w, &mail.message_reply_id)?;
    write_len_prefixed(w, &mail.reply_addr)?;

    let offset = w.stream_position()? - record_start;
    if offset % 2 == 1 {
        w.write_all(&[0u8])?;
    }

    w.write_u32::<NativeEndian>(mail.size)?;
    w.write_u32::<NativeEndian>(mail.seconds as u32)?;
    w.write_u32::<NativeEndian>(mail.received as u32)?;

    // Status is not written here; it lives solely in the filename tag
    // written above (see `index::filename`).
    w.write_u32::<NativeEndian>(mail.flags.bits())?;

    Ok(())
}

fn read_header(r: &mut impl Read) -> Result<IndexHeader, IndexError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            IndexError::ShortRead {
                expected: 4,
                got: 0,
            }
        } else {
            IndexError::Io(e)
        }
    })?;
    if &magic != MAGIC {
        return Err(IndexError::WrongMagic);
    }
    let version = r.read_u32::<NativeEndian>()?;
    if version != VERSION {
        return Err(IndexError::WrongVersion(version));
    }
    let pending = r.read_u32::<NativeEndian>()? != 0;
    let num_mails = r.read_u32::<NativeEndian>()? as i32;
    let unread = r.read_u32::<NativeEndian>()? as i32;
    Ok(IndexHeader {
        version,
        pending,
        num_mails,
        unread,
    })
}

fn write_header(w: &mut impl Write, header: &IndexHeader) -> Result<(), IndexError> {
    w.write_all(MAGIC)?;
    w.write_u32::<NativeEndian>(header.version)?;
    w.write_u32::<NativeEndian>(header.pending as u32)?;
    w.write_u32::<NativeEndian>(header.num_mails as u32)?;
    w.write_u32::<NativeEndian>(header.unread as u32)?;
    Ok(())
}

/// Load the full index at `path`.
///
/// If the header's `pending` sentinel is set, the caller is responsible
/// for checking whether it has a non-empty in-memory pending list before
/// trusting the result — see [`IndexError::UncleanShutdown`] and spec
/// §4.1 "Crash semantics". This function itself always parses whatever
/// records are present; it is the folder entity that decides to discard
/// the result and rescan.
pub fn load(path: &Path) -> Result<LoadedIndex, IndexError> {
    let file_len = std::fs::metadata(path)?.len();
    if file_len < HEADER_LEN {
        return Err(IndexError::ShortRead {
            expected: HEADER_LEN as usize,
            got: file_len as usize,
        });
    }
    let mut f = File::open(path)?;
    let header = read_header(&mut f)?;

    if header.num_mails < 0 || (header.num_mails as u64) > file_len {
        return Err(IndexError::CountExceedsFile {
            count: header.num_mails as i64,
        });
    }

    let mut mails = Vec::with_capacity(header.num_mails as usize);
    for _ in 0..header.num_mails {
        let record_start = f.stream_position()?;
        match read_record(&mut f, record_start) {
            Ok(m) => mails.push(m),
            Err(IndexError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(IndexError::ShortRead {
                    expected: header.num_mails as usize,
                    got: mails.len(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(LoadedIndex { header, mails })
}

/// Write a brand-new, clean index file (no pending records).
pub fn save(path: &Path, mails: &[MailInfo], unread: i32) -> Result<(), IndexError> {
    let mut f = File::create(path)?;
    let header = IndexHeader {
        version: VERSION,
        pending: false,
        num_mails: mails.len() as i32,
        unread,
    };
    write_header(&mut f, &header)?;
    for m in mails {
        let pos = f.stream_position()?;
        write_record(&mut f, pos, m)?;
    }
    Ok(())
}

/// Append `pending` records to an existing index file and rewrite the
/// 20-byte header in place with the new totals, clearing the pending
/// sentinel (spec §4.1 "Append mode").
pub fn append_pending(
    path: &Path,
    total_mails: i32,
    unread: i32,
    pending: &[MailInfo],
) -> Result<(), IndexError> {
    let mut f = OpenOptions::new().read(true).write(true).open(path)?;
    f.seek(SeekFrom::End(0))?;
    for m in pending {
        let pos = f.stream_position()?;
        write_record(&mut f, pos, m)?;
    }

    f.seek(SeekFrom::Start(0))?;
    let header = IndexHeader {
        version: VERSION,
        pending: false,
        num_mails: total_mails,
        unread,
    };
    write_header(&mut f, &header)?;
    Ok(())
}

/// Flip the on-disk `pending` byte to 1 in place, without touching the
/// rest of the header. Called the moment the *first* pending mail is
/// buffered so a crash forces a rescan (spec §4.4 "Add algorithm").
pub fn mark_pending(path: &Path) -> Result<(), IndexError> {
    let mut f = OpenOptions::new().write(true).open(path)?;
    f.seek(SeekFrom::Start(8))?;
    f.write_u32::<NativeEndian>(1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail_info::MailFlags;
    use tempfile::tempdir;

    fn sample_mail(n: u32) -> MailInfo {
        let mut m = MailInfo::new(format!("u{:04}.msg", n), Status::new(StatusKind::Unread));
        m.subject = format!("Subject {n}");
        m.from_addr = "alice@example.com".into();
        m.from_phrase = "Alice".into();
        m.to_list.push(Recipient::new("Bob", "bob@example.com"));
        m.to_phrase = "Bob".into();
        m.to_addr = "bob@example.com".into();
        m.message_id = format!("<{n}@example.com>");
        m.size = 1234 + n;
        m.seconds = 1_700_000_000 + n as i64;
        m.received = 1_700_000_100 + n as i64;
        m.flags = MailFlags::ATTACH;
        m
    }

    #[test]
    fn round_trips_header_and_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        let mails = vec![sample_mail(1), sample_mail(2), sample_mail(3)];
        save(&path, &mails, 3).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.header.num_mails, 3);
        assert_eq!(loaded.header.unread, 3);
        assert!(!loaded.header.pending);
        assert_eq!(loaded.mails.len(), 3);
        assert_eq!(loaded.mails[0].subject, "Subject 1");
        assert_eq!(loaded.mails[1].to_list[0].email, "bob@example.com");
        assert_eq!(loaded.mails[2].flags, MailFlags::ATTACH);
    }

    #[test]
    fn empty_index_has_20_byte_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        save(&path, &[], 0).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_LEN);
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.mails.len(), 0);
    }

    #[test]
    fn append_pending_updates_header_and_clears_sentinel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        save(&path, &[sample_mail(1)], 1).unwrap();
        mark_pending(&path).unwrap();
        assert!(load(&path).unwrap().header.pending);

        append_pending(&path, 2, 2, &[sample_mail(2)]).unwrap();
        let loaded = load(&path).unwrap();
        assert!(!loaded.header.pending);
        assert_eq!(loaded.header.num_mails, 2);
        assert_eq!(loaded.mails.len(), 2);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        std::fs::write(&path, b"XXXX\x07\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(matches!(load(&path), Err(IndexError::WrongMagic)));
    }

    #[test]
    fn short_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        std::fs::write(&path, b"SMFI\x07").unwrap();
        assert!(matches!(load(&path), Err(IndexError::ShortRead { .. })));
    }

    #[test]
    fn status_is_read_from_filename_not_flags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("folder.index");
        let mut m = sample_mail(1);
        m.filename = "r0001.msg".into();
        m.status = Status::marked(StatusKind::Replied);
        save(&path, &[m], 0).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.mails[0].status.kind, StatusKind::Replied);
        assert!(loaded.mails[0].status.marked);

        // Renaming the file outside this codec changes the recoverable
        // status on next load, even though nothing touched the record's
        // flags word.
        let renamed_name = crate::index::filename::rename_for("r0001.msg", Status::new(StatusKind::Read));
        assert_eq!(renamed_name, "o0001.msg");

        let mut m2 = sample_mail(2);
        m2.filename = renamed_name;
        m2.status = Status::marked(StatusKind::Replied); // stale in-memory status
        save(&path, &[m2], 0).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.mails[0].status.kind, StatusKind::Read);
        assert!(!reloaded.mails[0].status.marked);
    }
}
