//! IMAP mirror (C12): per-folder bookkeeping for a folder that mirrors a
//! remote IMAP mailbox (spec §6 supplement).
//!
//! The core never speaks IMAP itself — a transport collaborator fetches
//! headers and UIDs and hands them to the folder through the ordinary
//! `add_mail`/`mark_deleted` operations. This module only holds the
//! bookkeeping a mirrored folder needs: which server/path it mirrors, and
//! the last-seen remote UID sets used to reconcile a sync pass.

use std::collections::HashSet;

/// Identifies the remote mailbox a folder mirrors, plus the UID sets used
/// to detect additions/removals on the remote side between sync passes.
#[derive(Debug, Clone, Default)]
pub struct ImapMirrorInfo {
    pub server: String,
    pub user: String,
    pub path: String,
    /// Every UID the remote server reported on the last full sync.
    pub all_remote: HashSet<u64>,
    /// UIDs the remote server reports the local subscriber is aware of
    /// (used to detect mails fetched locally but not yet acknowledged).
    pub subscribed_remote: HashSet<u64>,
    /// Ordered names of every folder the account exposes on the remote
    /// server, as last reported by a folder-list command.
    pub all_folder_names: Vec<String>,
    /// Ordered names of the subset the user has subscribed to. A subset
    /// of `all_folder_names`, but kept separately since the server is
    /// the authority on ordering and membership for each independently.
    pub subscribed_folder_names: Vec<String>,
}

impl ImapMirrorInfo {
    pub fn new(server: impl Into<String>, user: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            path: path.into(),
            all_remote: HashSet::new(),
            subscribed_remote: HashSet::new(),
            all_folder_names: Vec::new(),
            subscribed_folder_names: Vec::new(),
        }
    }

    /// UIDs present in `all_remote` on the last sync but absent from the
    /// freshly fetched `current` set: these mails were deleted remotely
    /// and should be mirrored as deletions locally.
    pub fn removed_since_last_sync(&self, current: &HashSet<u64>) -> Vec<u64> {
        self.all_remote.difference(current).copied().collect()
    }

    /// UIDs present in `current` but not yet in `all_remote`: these are
    /// new arrivals that should be fetched and added locally.
    pub fn added_since_last_sync(&self, current: &HashSet<u64>) -> Vec<u64> {
        current.difference(&self.all_remote).copied().collect()
    }

    pub fn record_sync(&mut self, current: HashSet<u64>) {
        self.all_remote = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_additions_and_removals() {
        let mut mirror = ImapMirrorInfo::new("imap.example.com", "alice", "INBOX");
        mirror.record_sync([1, 2, 3].into_iter().collect());

        let current: HashSet<u64> = [2, 3, 4].into_iter().collect();
        let mut removed = mirror.removed_since_last_sync(&current);
        removed.sort();
        let mut added = mirror.added_since_last_sync(&current);
        added.sort();

        assert_eq!(removed, vec![1]);
        assert_eq!(added, vec![4]);
    }
}
