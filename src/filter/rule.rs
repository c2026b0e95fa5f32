//! Filter evaluator (C8): matches a mail-info against a rule list (spec
//! §4.7).

use uuid::Uuid;

use crate::filter::pattern::{Pattern, PatternFlags};
use crate::mail_info::{MailFlags, MailInfo, StatusKind};

/// A raw header name/value pair, as produced by the header-parsing
/// collaborator named in spec §1 (out of scope here — the core only
/// consumes what it returns).
#[derive(Debug, Clone)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
}

/// Lazily materializes a mail's raw header list from its file on disk.
/// `HEADER_MATCH` is the only rule kind that needs this; every other rule
/// kind works off the already-loaded `MailInfo`.
pub trait HeaderSource {
    fn raw_headers(&self, mail: &MailInfo) -> Vec<RawHeader>;
}

/// One of the statuses a `STATUS_MATCH` rule can test for (spec §4.7
/// table; these mirror `RULE_STATUS_*` in `original_source/folder.c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTest {
    New,
    Read,
    Unread,
    Replied,
    Forwarded,
    Pending,
    Sent,
}

impl StatusTest {
    fn matches(self, mail: &MailInfo) -> bool {
        match self {
            StatusTest::New => mail.is_new(),
            StatusTest::Read => mail.status.kind == StatusKind::Read,
            StatusTest::Unread => mail.status.kind == StatusKind::Unread,
            StatusTest::Replied => matches!(
                mail.status.kind,
                StatusKind::Replied | StatusKind::ReplForw
            ),
            StatusTest::Forwarded => matches!(
                mail.status.kind,
                StatusKind::Forward | StatusKind::ReplForw
            ),
            StatusTest::Pending => mail.status.kind == StatusKind::WaitSend,
            StatusTest::Sent => mail.status.kind == StatusKind::Sent,
        }
    }
}

/// A single filter rule (spec §4.7 table).
#[derive(Debug, Clone)]
pub enum Rule {
    FromMatch(Vec<Pattern>),
    RcptMatch(Vec<Pattern>),
    SubjectMatch(Vec<Pattern>),
    HeaderMatch {
        name: Pattern,
        values: Vec<Pattern>,
    },
    BodyMatch(Pattern),
    AttachmentMatch,
    StatusMatch(StatusTest),
}

impl Rule {
    /// Evaluate this rule against `mail`. `headers` is only consulted for
    /// `HeaderMatch`; `body_tokens` only for `BodyMatch` (used by search,
    /// never by live evaluation per spec §4.7).
    pub fn matches(
        &self,
        mail: &MailInfo,
        headers: &dyn HeaderSource,
        body_tokens: Option<&[String]>,
    ) -> bool {
        match self {
            Rule::FromMatch(patterns) => patterns
                .iter()
                .any(|p| p.matches(&mail.from_addr) || p.matches(&mail.from_phrase)),
            Rule::RcptMatch(patterns) => mail
                .to_list
                .iter()
                .chain(mail.cc_list.iter())
                .any(|r| patterns.iter().any(|p| p.matches(&r.realname) || p.matches(&r.email))),
            Rule::SubjectMatch(patterns) => patterns.iter().any(|p| p.matches(&mail.subject)),
            Rule::HeaderMatch { name, values } => {
                let raw = headers.raw_headers(mail);
                raw.iter()
                    .filter(|h| name.matches(&h.name))
                    .any(|h| values.iter().any(|p| p.matches(&h.value)))
            }
            Rule::BodyMatch(pattern) => body_tokens
                .map(|tokens| tokens.iter().any(|t| pattern.matches(t)))
                .unwrap_or(false),
            Rule::AttachmentMatch => mail.flags.contains(MailFlags::ATTACH),
            Rule::StatusMatch(test) => test.matches(mail),
        }
    }
}

/// How a filter's rules combine (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Every rule must match.
    All,
    /// Any rule matching is enough.
    Any,
}

/// When a filter is eligible to run (spec §4.8's action flags, reused
/// here to scope evaluation to the right trigger).
bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FilterTrigger: u32 {
        const NEW     = 0b001;
        const SENT    = 0b010;
        const REQUEST = 0b100;
    }
}

/// Build a `Pattern` for one text field from a raw user string, inferring
/// `SUBSTR` vs. glob from whether it looks like a glob (spec §4.7
/// "Pattern match semantics").
pub fn compile_field_pattern(text: &str, nocase: bool, ascii7: bool) -> Pattern {
    let mut flags = PatternFlags::empty();
    if !crate::filter::pattern::looks_like_glob(text) {
        flags |= PatternFlags::SUBSTR;
    }
    if nocase {
        flags |= PatternFlags::NOCASE;
    }
    if ascii7 {
        flags |= PatternFlags::ASCII7;
    }
    Pattern::compile(text, flags)
}

/// A filter: ordered rule list, combination mode, trigger flags, and the
/// side effects to run on a match (spec §4.7/§4.8). `id` identifies the
/// filter across renames and reordering, the way the user-facing filter
/// list is expected to track one entry through edits.
#[derive(Debug, Clone)]
pub struct Filter {
    pub id: Uuid,
    pub name: String,
    pub rules: Vec<Rule>,
    pub mode: FilterMode,
    pub triggers: FilterTrigger,
    pub dest_folder: Option<String>,
    pub sound_file: Option<String>,
    pub arexx_file: Option<String>,
    pub search_filter: bool,
}

impl Filter {
    pub fn new(name: impl Into<String>, mode: FilterMode, triggers: FilterTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rules: Vec::new(),
            mode,
            triggers,
            dest_folder: None,
            sound_file: None,
            arexx_file: None,
            search_filter: false,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate this filter against `mail` per the mode semantics (spec
    /// §4.7): `All` rejects on any miss, `Any` accepts on any hit.
    pub fn evaluate(&self, mail: &MailInfo, headers: &dyn HeaderSource) -> bool {
        match self.mode {
            FilterMode::All => self.rules.iter().all(|r| r.matches(mail, headers, None)),
            FilterMode::Any => self.rules.iter().any(|r| r.matches(mail, headers, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail_info::Status;

    struct NoHeaders;
    impl HeaderSource for NoHeaders {
        fn raw_headers(&self, _mail: &MailInfo) -> Vec<RawHeader> {
            Vec::new()
        }
    }

    fn mail_from(addr: &str) -> MailInfo {
        let mut m = MailInfo::new("u0001.msg", Status::new(StatusKind::Unread));
        m.from_addr = addr.to_string();
        m
    }

    #[test]
    fn from_match_all_mode_spec_scenario_4() {
        let filter = Filter::new("f", FilterMode::All, FilterTrigger::NEW).with_rule(
            Rule::FromMatch(vec![Pattern::compile(
                "*@example.com",
                PatternFlags::NOCASE,
            )]),
        );

        let matching = mail_from("alice@example.com");
        assert!(filter.evaluate(&matching, &NoHeaders));

        let other = mail_from("alice@other.net");
        assert!(!filter.evaluate(&other, &NoHeaders));
    }

    #[test]
    fn any_mode_accepts_on_first_hit() {
        let filter = Filter::new("f", FilterMode::Any, FilterTrigger::NEW)
            .with_rule(Rule::AttachmentMatch)
            .with_rule(Rule::StatusMatch(StatusTest::Unread));

        let mut m = mail_from("x@example.com");
        m.status = Status::new(StatusKind::Read);
        assert!(!filter.evaluate(&m, &NoHeaders));

        m.flags = MailFlags::ATTACH;
        assert!(filter.evaluate(&m, &NoHeaders));
    }

    #[test]
    fn replforw_satisfies_both_replied_and_forwarded_tests() {
        let mut m = mail_from("x@example.com");
        m.status = Status::new(StatusKind::ReplForw);
        assert!(StatusTest::Replied.matches(&m));
        assert!(StatusTest::Forwarded.matches(&m));
    }
}
