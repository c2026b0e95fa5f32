//! Filter actions (C9): move/sound/script/search dispatch for a matched
//! mail (spec §4.8).

use uuid::Uuid;

use crate::filter::rule::{Filter, HeaderSource};
use crate::mail_info::MailInfo;

/// Side effects an embedder must implement to receive filter action
/// dispatch (sound/script hand-off and search-match surfacing). Modeled
/// as a trait object rather than a concrete UI type, matching the
/// teacher's pattern of handing work to a UI collaborator through a
/// trait/callback instead of a concrete GUI dependency.
pub trait FilterUiHooks {
    fn play_sound(&self, sound_file: &str);
    fn run_script(&self, arexx_file: &str);
    fn search_match(&self, mail: &MailInfo);
}

/// Outcome of running the filter list against one mail.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub matched_filter: Option<String>,
    pub matched_filter_id: Option<Uuid>,
    pub move_to_folder: Option<String>,
}

/// Scan `filters` in order and dispatch the first one whose triggers
/// include `trigger` and whose rules match `mail` (spec §4.8). Actions
/// run in the fixed order: move, sound, script, search.
pub fn apply_filters(
    filters: &[Filter],
    trigger: crate::filter::rule::FilterTrigger,
    mail: &MailInfo,
    headers: &dyn HeaderSource,
    hooks: &dyn FilterUiHooks,
) -> FilterOutcome {
    for filter in filters {
        if !filter.triggers.contains(trigger) {
            continue;
        }
        if !filter.evaluate(mail, headers) {
            continue;
        }

        let mut outcome = FilterOutcome {
            matched_filter: Some(filter.name.clone()),
            matched_filter_id: Some(filter.id),
            move_to_folder: None,
        };

        if let Some(dest) = &filter.dest_folder {
            outcome.move_to_folder = Some(dest.clone());
        }
        if let Some(sound) = &filter.sound_file {
            hooks.play_sound(sound);
        }
        if let Some(script) = &filter.arexx_file {
            hooks.run_script(script);
        }
        if filter.search_filter {
            hooks.search_match(mail);
        }

        return outcome;
    }

    FilterOutcome::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::pattern::{Pattern, PatternFlags};
    use crate::filter::rule::{FilterMode, FilterTrigger, RawHeader, Rule};
    use crate::mail_info::Status;
    use std::cell::RefCell;

    struct NoHeaders;
    impl HeaderSource for NoHeaders {
        fn raw_headers(&self, _mail: &MailInfo) -> Vec<RawHeader> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        sounds: RefCell<Vec<String>>,
    }
    impl FilterUiHooks for RecordingHooks {
        fn play_sound(&self, sound_file: &str) {
            self.sounds.borrow_mut().push(sound_file.to_string());
        }
        fn run_script(&self, _arexx_file: &str) {}
        fn search_match(&self, _mail: &MailInfo) {}
    }

    #[test]
    fn first_matching_filter_wins_and_dispatches_actions() {
        let mut filter = Filter::new("move-spam", FilterMode::All, FilterTrigger::NEW)
            .with_rule(Rule::FromMatch(vec![Pattern::compile(
                "*@spam.test",
                PatternFlags::NOCASE,
            )]));
        filter.dest_folder = Some("Spam".to_string());
        filter.sound_file = Some("ding.wav".to_string());

        let mut mail = MailInfo::new("u0001.msg", Status::new(crate::mail_info::StatusKind::Unread));
        mail.from_addr = "x@spam.test".into();

        let hooks = RecordingHooks::default();
        let outcome = apply_filters(&[filter], FilterTrigger::NEW, &mail, &NoHeaders, &hooks);

        assert_eq!(outcome.move_to_folder.as_deref(), Some("Spam"));
        assert_eq!(hooks.sounds.borrow().as_slice(), ["ding.wav"]);
    }

    #[test]
    fn wrong_trigger_is_skipped() {
        let filter = Filter::new("f", FilterMode::Any, FilterTrigger::SENT)
            .with_rule(Rule::AttachmentMatch);
        let mail = MailInfo::new("u0001.msg", Status::new(crate::mail_info::StatusKind::Unread));
        let hooks = RecordingHooks::default();
        let outcome = apply_filters(&[filter], FilterTrigger::NEW, &mail, &NoHeaders, &hooks);
        assert!(outcome.matched_filter.is_none());
    }
}
