//! Search engine (C10): background search across a folder set, producing
//! match batches to a UI callback (spec §4.9).
//!
//! AMBIENT — implemented as a `tokio::task::spawn_blocking` background
//! task (the crate's only use of an async runtime), matching the
//! teacher's `tokio`-driven background sync/import tasks
//! (`async_sync_service.rs`, `maildir_importer.rs`) which likewise carry
//! a cancellation flag as an `Arc<AtomicBool>` alongside the task handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::filter::pattern::{Pattern, PatternFlags};
use crate::filter::rule::{Filter, FilterMode, FilterTrigger, HeaderSource, RawHeader, Rule};
use crate::folder::Folder;
use crate::mail_info::MailInfo;

const BATCH_SIZE: usize = 100;

/// User-facing search criteria (spec §4.9 "Inputs"). Any combination of
/// fields may be populated; an unset field is not constrained.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub to: Option<String>,
}

/// One folder's mail-info list, captured while its lock was held (spec
/// §4.9 step 1). The search engine itself never touches live `Folder`
/// state afterwards — only this owned snapshot — so it can run on a
/// background task without folder lifetimes crossing the task boundary.
#[derive(Debug, Clone)]
pub struct FolderSnapshot {
    pub folder_name: String,
    pub mails: Vec<MailInfo>,
}

/// Snapshot `folders` under their own locks (spec §4.9 step 1 "acquire
/// read locks on each").
pub fn snapshot_folders(folders: &[&Folder]) -> Vec<FolderSnapshot> {
    folders
        .iter()
        .map(|f| {
            let _guard = f.lock();
            FolderSnapshot {
                folder_name: f.name.clone(),
                mails: f.mails().to_vec(),
            }
        })
        .collect()
}

/// Build the `FROM | SUBJECT | BODY | RCPT` filter for `options` (spec
/// §4.9 step 2): every populated field becomes a rule, compiled
/// `SUBSTR | NOCASE`; populated fields must all match (mode `ALL`).
pub fn build_search_filter(options: &SearchOptions) -> Filter {
    let flags = PatternFlags::SUBSTR | PatternFlags::NOCASE;
    let mut filter = Filter::new("search", FilterMode::All, FilterTrigger::REQUEST);
    if let Some(from) = &options.from {
        filter = filter.with_rule(Rule::FromMatch(vec![Pattern::compile(from.clone(), flags)]));
    }
    if let Some(subject) = &options.subject {
        filter = filter.with_rule(Rule::SubjectMatch(vec![Pattern::compile(subject.clone(), flags)]));
    }
    if let Some(body) = &options.body {
        filter = filter.with_rule(Rule::BodyMatch(Pattern::compile(body.clone(), flags)));
    }
    if let Some(to) = &options.to {
        filter = filter.with_rule(Rule::RcptMatch(vec![Pattern::compile(to.clone(), flags)]));
    }
    filter
}

/// Side-effect surface a search hands its results to (spec §4.9 step 4
/// "Hand each batch to the UI collaborator synchronously").
pub trait SearchUiHooks: Send + Sync {
    fn deliver_batch(&self, folder_name: &str, batch: Vec<MailInfo>);
    fn finished(&self, total_matches: usize);
}

struct NoHeaders;
impl HeaderSource for NoHeaders {
    fn raw_headers(&self, _mail: &MailInfo) -> Vec<RawHeader> {
        // BODY_MATCH is the only rule kind search evaluates that would
        // need raw headers' sibling, body tokens; HEADER_MATCH itself is
        // not part of the search criteria set (spec §4.9 step 2).
        Vec::new()
    }
}

/// A running (or finished) background search. Dropping the handle does
/// not cancel the search; call [`SearchHandle::abort`] explicitly.
pub struct SearchHandle {
    abort: Arc<AtomicBool>,
    join: tokio::task::JoinHandle<usize>,
}

impl SearchHandle {
    /// Signal the search to stop at its next safe point (spec §5
    /// "Cancellation": between mails and between batches).
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Wait for the search to finish (or have unwound from an abort) and
    /// return the total number of matches delivered.
    pub async fn join(self) -> usize {
        self.join.await.unwrap_or(0)
    }
}

/// Run a search over already-snapshotted folders on a dedicated
/// background task (spec §4.9).
pub fn spawn_search(
    snapshots: Vec<FolderSnapshot>,
    options: SearchOptions,
    hooks: Arc<dyn SearchUiHooks>,
) -> SearchHandle {
    let abort = Arc::new(AtomicBool::new(false));
    let abort_for_task = Arc::clone(&abort);
    let join =
        tokio::task::spawn_blocking(move || run_search(snapshots, &options, hooks.as_ref(), &abort_for_task));
    SearchHandle { abort, join }
}

fn run_search(
    snapshots: Vec<FolderSnapshot>,
    options: &SearchOptions,
    hooks: &dyn SearchUiHooks,
    abort: &AtomicBool,
) -> usize {
    let filter = build_search_filter(options);
    let headers = NoHeaders;
    let mut total = 0usize;

    'folders: for snapshot in &snapshots {
        let mut batch: Vec<MailInfo> = Vec::with_capacity(BATCH_SIZE);
        let mut batch_started = Instant::now();

        for mail in &snapshot.mails {
            if abort.load(Ordering::Relaxed) {
                if !batch.is_empty() {
                    hooks.deliver_batch(&snapshot.folder_name, std::mem::take(&mut batch));
                }
                break 'folders;
            }

            if filter.evaluate(mail, &headers) {
                batch.push(mail.clone());
                total += 1;
            }

            if batch.len() >= BATCH_SIZE || (!batch.is_empty() && batch_started.elapsed().as_secs() >= 1) {
                hooks.deliver_batch(&snapshot.folder_name, std::mem::take(&mut batch));
                batch_started = Instant::now();
            }
        }

        if !batch.is_empty() {
            hooks.deliver_batch(&snapshot.folder_name, batch);
        }
    }

    hooks.finished(total);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail_info::{Status, StatusKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingHooks {
        batches: Mutex<Vec<Vec<MailInfo>>>,
        total: Mutex<Option<usize>>,
    }

    impl SearchUiHooks for CollectingHooks {
        fn deliver_batch(&self, _folder_name: &str, batch: Vec<MailInfo>) {
            self.batches.lock().unwrap().push(batch);
        }
        fn finished(&self, total_matches: usize) {
            *self.total.lock().unwrap() = Some(total_matches);
        }
    }

    fn mail_with_subject(n: usize, subject: &str) -> MailInfo {
        let mut m = MailInfo::new(format!("u{n:04}.msg"), Status::new(StatusKind::Unread));
        m.subject = subject.to_string();
        m
    }

    #[test]
    fn search_batch_finds_exact_match_count_spec_scenario_5() {
        let mut mails: Vec<MailInfo> = (0..500).map(|i| mail_with_subject(i, "routine update")).collect();
        for i in [3, 17, 42, 99, 150, 301, 480] {
            mails[i] = mail_with_subject(i, "project kickoff");
        }
        let snapshots = vec![
            FolderSnapshot {
                folder_name: "Inbox".into(),
                mails: mails[..200].to_vec(),
            },
            FolderSnapshot {
                folder_name: "Archive".into(),
                mails: mails[200..350].to_vec(),
            },
            FolderSnapshot {
                folder_name: "Projects".into(),
                mails: mails[350..].to_vec(),
            },
        ];

        let hooks = Arc::new(CollectingHooks::default());
        let options = SearchOptions {
            subject: Some("project".into()),
            ..Default::default()
        };
        let abort = AtomicBool::new(false);
        let total = run_search(snapshots, &options, hooks.as_ref(), &abort);

        assert_eq!(total, 7);
        let delivered: usize = hooks.batches.lock().unwrap().iter().map(|b| b.len()).sum();
        assert_eq!(delivered, 7);
        assert_eq!(*hooks.total.lock().unwrap(), Some(7));
    }

    #[test]
    fn abort_flushes_partial_batch_and_stops_early() {
        let mails: Vec<MailInfo> = (0..500).map(|i| mail_with_subject(i, "project update")).collect();
        let snapshots = vec![FolderSnapshot {
            folder_name: "Inbox".into(),
            mails,
        }];

        let hooks = Arc::new(CollectingHooks::default());
        let options = SearchOptions {
            subject: Some("project".into()),
            ..Default::default()
        };
        let abort = AtomicBool::new(true);
        let total = run_search(snapshots, &options, hooks.as_ref(), &abort);
        assert_eq!(total, 0);
    }

    #[test]
    fn batches_split_at_100_matches() {
        let mails: Vec<MailInfo> = (0..250).map(|i| mail_with_subject(i, "project")).collect();
        let snapshots = vec![FolderSnapshot {
            folder_name: "Inbox".into(),
            mails,
        }];
        let hooks = Arc::new(CollectingHooks::default());
        let options = SearchOptions {
            subject: Some("project".into()),
            ..Default::default()
        };
        let abort = AtomicBool::new(false);
        let total = run_search(snapshots, &options, hooks.as_ref(), &abort);
        assert_eq!(total, 250);
        let sizes: Vec<usize> = hooks.batches.lock().unwrap().iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn spawn_search_runs_on_background_task_and_joins() {
        let mails: Vec<MailInfo> = (0..10).map(|i| mail_with_subject(i, "project")).collect();
        let snapshots = vec![FolderSnapshot {
            folder_name: "Inbox".into(),
            mails,
        }];
        let hooks = Arc::new(CollectingHooks::default());
        let handle = tokio_test::block_on(async {
            spawn_search(
                snapshots,
                SearchOptions {
                    subject: Some("project".into()),
                    ..Default::default()
                },
                hooks.clone(),
            )
        });
        let total = tokio_test::block_on(handle.join());
        assert_eq!(total, 10);
    }
}
