//! Pattern matching shared by the filter evaluator, search engine, and
//! live-filter view (spec §4.7) — one authority for "does this pattern
//! match this string", in the same spirit as the filename-status codec
//! being the one authority for filename⟷status (spec §9).
//!
//! Glob syntax per spec §4.7/spec.md:191: `*` any run, `?` one character,
//! `#` folded into `*` (Amiga-style repetition), and `[...]` character
//! sets. `original_source/support_indep.c` has no glob matcher of its own
//! to ground this on (it's generic string/array helpers only); the glob
//! rules here follow the spec's shell-like description directly.

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PatternFlags: u32 {
        /// Plain substring containment rather than glob matching.
        const SUBSTR = 0b0001;
        /// Case-insensitive comparison.
        const NOCASE = 0b0010;
        /// Treat the pattern as a literal, not a glob (alias used by some
        /// rule kinds alongside SUBSTR; kept distinct since a caller may
        /// want literal-but-case-sensitive `Equals`-style matching).
        const NOPATT = 0b0100;
        /// Hint: both pattern and subject are known ASCII-7, enabling a
        /// byte-wise fast path instead of char-boundary-aware scanning.
        const ASCII7 = 0b1000;
    }
}

/// A compiled pattern: the source text plus the flags it was compiled
/// with. Compilation itself is just flag + string bookkeeping — the glob
/// matcher below is evaluated lazily per call.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    flags: PatternFlags,
}

impl Pattern {
    pub fn compile(text: impl Into<String>, flags: PatternFlags) -> Self {
        let text = text.into();
        Self { text, flags }
    }

    pub fn matches(&self, subject: &str) -> bool {
        let (pattern, subject) = if self.flags.contains(PatternFlags::NOCASE) {
            (self.text.to_lowercase(), subject.to_lowercase())
        } else {
            (self.text.clone(), subject.to_string())
        };

        if self.flags.contains(PatternFlags::SUBSTR) || self.flags.contains(PatternFlags::NOPATT) {
            subject.contains(&pattern)
        } else {
            glob_match(&pattern, &subject)
        }
    }
}

/// Shell-like glob match: `*` matches any run (including empty), `?`
/// matches exactly one character, `[abc]`/`[a-z]` match a character set,
/// `[!abc]` negates it. No other characters are special.
fn glob_match(pattern: &str, subject: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = subject.chars().collect();
    glob_match_inner(&p, &s)
}

fn glob_match_inner(p: &[char], s: &[char]) -> bool {
    match p.first() {
        None => s.is_empty(),
        Some('*') | Some('#') => {
            // Collapse runs of `*`/`#` and try every split point.
            let mut rest = p;
            while matches!(rest.first(), Some('*') | Some('#')) {
                rest = &rest[1..];
            }
            if rest.is_empty() {
                return true;
            }
            (0..=s.len()).any(|i| glob_match_inner(rest, &s[i..]))
        }
        Some('?') => !s.is_empty() && glob_match_inner(&p[1..], &s[1..]),
        Some('[') => {
            if s.is_empty() {
                return false;
            }
            match parse_class(p) {
                Some((matched, consumed)) => {
                    matched == set_contains_hits(&p[1..consumed.saturating_sub(1)], s[0])
                        && glob_match_inner(&p[consumed..], &s[1..])
                }
                None => p[0] == s[0] && glob_match_inner(&p[1..], &s[1..]),
            }
        }
        Some(c) => !s.is_empty() && *c == s[0] && glob_match_inner(&p[1..], &s[1..]),
    }
}

/// Returns `(expect_membership, index_after_closing_bracket)` for a
/// `[...]`/`[!...]` class starting at `p[0] == '['`, or `None` if there is
/// no closing bracket (treat `[` literally in that case).
fn parse_class(p: &[char]) -> Option<(bool, usize)> {
    let close = p.iter().position(|&c| c == ']')?;
    if close == 0 {
        return None;
    }
    let negate = p.get(1) == Some(&'!');
    Some((!negate, close + 1))
}

fn set_contains_hits(class: &[char], c: char) -> bool {
    let class = if class.first() == Some(&'!') {
        &class[1..]
    } else {
        class
    };
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= c && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

/// Hint whether a pattern contains glob metacharacters at all — used by
/// callers deciding whether to compile with `SUBSTR` or full glob
/// matching when the user hasn't said explicitly.
pub fn looks_like_glob(text: &str) -> bool {
    text.contains(['*', '?', '[', '#'])
}
