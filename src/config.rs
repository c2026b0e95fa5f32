//! Per-folder config sidecar file (`<folder>.config`): a `FICO`-tagged,
//! line-oriented `KEY=VALUE` format (spec §6).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::folder::{FolderKind, FolderSpecial};
use crate::sort::{SortField, SortSpec};

const HEADER_LINE: &str = "FICO";
const REVERSE_BIT: u32 = 0x10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing FICO header line")]
    MissingHeader,

    #[error("malformed config line: {0:?}")]
    MalformedLine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed `.config` contents for one folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderConfig {
    pub name: String,
    pub kind: Option<FolderKind>,
    pub special: Option<FolderSpecial>,
    pub primary_sort: Option<SortSpec>,
    pub secondary_sort: Option<SortSpec>,
    pub default_to: Option<String>,
    pub default_from: Option<String>,
    pub default_reply_to: Option<String>,
    pub default_signature: Option<String>,
    pub is_imap: bool,
    pub imap_user: Option<String>,
    pub imap_path: Option<String>,
    pub imap_server: Option<String>,
    pub imap_all_folders: Vec<String>,
    pub imap_subscribed_folders: Vec<String>,
}

fn sort_field_bits(field: SortField) -> u32 {
    match field {
        SortField::Status => 0,
        SortField::FromOrTo => 1,
        SortField::Subject => 2,
        SortField::Reply => 3,
        SortField::Date => 4,
        SortField::Size => 5,
        SortField::Filename => 6,
        SortField::Pop3 => 7,
        SortField::Received => 8,
        SortField::Thread => 9,
    }
}

fn sort_field_from_bits(bits: u32) -> Option<SortField> {
    Some(match bits {
        0 => SortField::Status,
        1 => SortField::FromOrTo,
        2 => SortField::Subject,
        3 => SortField::Reply,
        4 => SortField::Date,
        5 => SortField::Size,
        6 => SortField::Filename,
        7 => SortField::Pop3,
        8 => SortField::Received,
        9 => SortField::Thread,
        _ => return None,
    })
}

fn encode_sort(spec: SortSpec) -> u32 {
    let mut bits = sort_field_bits(spec.field);
    if spec.reverse {
        bits |= REVERSE_BIT;
    }
    bits
}

fn decode_sort(raw: u32) -> Option<SortSpec> {
    let field = sort_field_from_bits(raw & !REVERSE_BIT)?;
    Some(SortSpec::new(field, raw & REVERSE_BIT != 0))
}

pub(crate) fn kind_from_num(n: u32) -> Option<FolderKind> {
    match n {
        0 => Some(FolderKind::Recv),
        1 => Some(FolderKind::Send),
        2 => Some(FolderKind::MailingList),
        _ => None,
    }
}

pub(crate) fn kind_to_num(k: FolderKind) -> u32 {
    match k {
        FolderKind::Recv => 0,
        FolderKind::Send => 1,
        FolderKind::MailingList => 2,
    }
}

pub(crate) fn special_from_num(n: u32) -> Option<FolderSpecial> {
    match n {
        0 => Some(FolderSpecial::No),
        1 => Some(FolderSpecial::Incoming),
        2 => Some(FolderSpecial::Outgoing),
        3 => Some(FolderSpecial::Sent),
        4 => Some(FolderSpecial::Deleted),
        5 => Some(FolderSpecial::Spam),
        6 => Some(FolderSpecial::Group),
        7 => Some(FolderSpecial::Spam),
        _ => None,
    }
}

pub(crate) fn special_to_num(s: FolderSpecial) -> u32 {
    match s {
        FolderSpecial::No => 0,
        FolderSpecial::Incoming => 1,
        FolderSpecial::Outgoing => 2,
        FolderSpecial::Sent => 3,
        FolderSpecial::Deleted => 4,
        FolderSpecial::Spam => 7,
        FolderSpecial::Group => 6,
    }
}

/// Parse a `.config` file's contents.
pub fn parse(contents: &str) -> Result<FolderConfig, ConfigError> {
    let mut lines = contents.lines();
    match lines.next() {
        Some(first) if first.trim() == HEADER_LINE => {}
        _ => return Err(ConfigError::MissingHeader),
    }

    let mut raw: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedLine(line.to_string()))?;
        raw.entry(key.trim().to_string())
            .or_default()
            .push(value.trim().to_string());
    }

    let mut cfg = FolderConfig::default();
    if let Some(v) = raw.get("Name").and_then(|v| v.first()) {
        cfg.name = v.clone();
    }
    if let Some(v) = raw.get("Type").and_then(|v| v.first()) {
        cfg.kind = v.parse::<u32>().ok().and_then(kind_from_num);
    }
    if let Some(v) = raw.get("Special").and_then(|v| v.first()) {
        cfg.special = v.parse::<u32>().ok().and_then(special_from_num);
    }
    if let Some(v) = raw.get("PrimarySort").and_then(|v| v.first()) {
        cfg.primary_sort = v.parse::<u32>().ok().and_then(decode_sort);
    }
    if let Some(v) = raw.get("SecondarySort").and_then(|v| v.first()) {
        cfg.secondary_sort = v.parse::<u32>().ok().and_then(decode_sort);
    }
    cfg.default_to = raw.get("DefaultTo").and_then(|v| v.first()).cloned();
    cfg.default_from = raw.get("DefaultFrom").and_then(|v| v.first()).cloned();
    cfg.default_reply_to = raw.get("DefaultReplyTo").and_then(|v| v.first()).cloned();
    cfg.default_signature = raw.get("DefaultSignature").and_then(|v| v.first()).cloned();
    cfg.is_imap = raw
        .get("IsIMap")
        .and_then(|v| v.first())
        .map(|v| v == "1")
        .unwrap_or(false);
    cfg.imap_user = raw.get("IMapUser").and_then(|v| v.first()).cloned();
    cfg.imap_path = raw.get("IMapPath").and_then(|v| v.first()).cloned();
    cfg.imap_server = raw.get("IMapServer").and_then(|v| v.first()).cloned();
    cfg.imap_all_folders = raw.get("IMapFolder").cloned().unwrap_or_default();
    cfg.imap_subscribed_folders = raw.get("IMapSubFolder").cloned().unwrap_or_default();

    Ok(cfg)
}

/// Serialize a `FolderConfig` back to `.config` file contents.
pub fn render(cfg: &FolderConfig) -> String {
    let mut out = String::new();
    out.push_str(HEADER_LINE);
    out.push('\n');
    out.push_str(&format!("Name={}\n", cfg.name));
    if let Some(k) = cfg.kind {
        out.push_str(&format!("Type={}\n", kind_to_num(k)));
    }
    if let Some(s) = cfg.special {
        out.push_str(&format!("Special={}\n", special_to_num(s)));
    }
    if let Some(s) = cfg.primary_sort {
        out.push_str(&format!("PrimarySort={}\n", encode_sort(s)));
    }
    if let Some(s) = cfg.secondary_sort {
        out.push_str(&format!("SecondarySort={}\n", encode_sort(s)));
    }
    for (key, value) in [
        ("DefaultTo", &cfg.default_to),
        ("DefaultFrom", &cfg.default_from),
        ("DefaultReplyTo", &cfg.default_reply_to),
        ("DefaultSignature", &cfg.default_signature),
    ] {
        if let Some(v) = value {
            out.push_str(&format!("{key}={v}\n"));
        }
    }
    out.push_str(&format!("IsIMap={}\n", cfg.is_imap as u32));
    for (key, value) in [
        ("IMapUser", &cfg.imap_user),
        ("IMapPath", &cfg.imap_path),
        ("IMapServer", &cfg.imap_server),
    ] {
        if let Some(v) = value {
            out.push_str(&format!("{key}={v}\n"));
        }
    }
    for f in &cfg.imap_all_folders {
        out.push_str(&format!("IMapFolder={f}\n"));
    }
    for f in &cfg.imap_subscribed_folders {
        out.push_str(&format!("IMapSubFolder={f}\n"));
    }
    out
}

pub fn load(path: &Path) -> Result<FolderConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
}

pub fn save(path: &Path, cfg: &FolderConfig) -> Result<(), ConfigError> {
    fs::write(path, render(cfg))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_render_and_parse() {
        let cfg = FolderConfig {
            name: "Inbox".into(),
            kind: Some(FolderKind::Recv),
            special: Some(FolderSpecial::Incoming),
            primary_sort: Some(SortSpec::new(SortField::Date, true)),
            secondary_sort: Some(SortSpec::new(SortField::FromOrTo, false)),
            default_to: Some("me@example.com".into()),
            is_imap: true,
            imap_user: Some("me".into()),
            imap_path: Some("INBOX".into()),
            imap_server: Some("imap.example.com".into()),
            imap_all_folders: vec!["INBOX".into(), "Archive".into()],
            imap_subscribed_folders: vec!["INBOX".into()],
            ..Default::default()
        };
        let rendered = render(&cfg);
        assert!(rendered.starts_with("FICO\n"));
        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(parse("Name=x\n"), Err(ConfigError::MissingHeader)));
    }
}
