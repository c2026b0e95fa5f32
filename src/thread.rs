//! Thread linker (C7): builds the reply-to forest over mail-info records
//! within one folder (spec §4.6).
//!
//! Threads are modeled as indices into the folder's `mail_info_array`
//! (spec §9 "Cyclic structures") rather than pointers, so a `remove` only
//! has to fix indices already in hand — never chase raw references.

use crate::mail_info::MailInfo;

/// Link `new_idx` into the reply forest of `mails`, following
/// `message_id`/`message_reply_id` matches in both directions (spec
/// §4.4 "Add algorithm", last bullet). Call this only after `new_idx` has
/// already been pushed into `mails`.
pub fn link_new_mail(mails: &mut [MailInfo], new_idx: usize) {
    let new_message_id = mails[new_idx].message_id.clone();
    let new_reply_id = mails[new_idx].message_reply_id.clone();

    // Other mails that reply to this one: append `new_idx` as a sibling
    // at the tail of their reply chain.
    if !new_message_id.is_empty() {
        for i in 0..mails.len() {
            if i == new_idx {
                continue;
            }
            if mails[i].message_reply_id.eq_ignore_ascii_case(&new_message_id) {
                append_reply(mails, i, new_idx);
            }
        }
    }

    // This mail replies to some other mail: append it as a sibling at the
    // tail of that mail's reply chain.
    if !new_reply_id.is_empty() {
        for i in 0..mails.len() {
            if i == new_idx {
                continue;
            }
            if mails[i].message_id.eq_ignore_ascii_case(&new_reply_id) {
                append_reply(mails, i, new_idx);
                break;
            }
        }
    }
}

/// Append `child_idx` to the tail of `parent_idx`'s reply chain
/// (`sub_thread_mail` first, then `next_thread_mail` siblings) and mark
/// `child_idx` as a child mail.
fn append_reply(mails: &mut [MailInfo], parent_idx: usize, child_idx: usize) {
    match mails[parent_idx].sub_thread_mail {
        None => mails[parent_idx].sub_thread_mail = Some(child_idx),
        Some(first) => {
            let mut cur = first;
            while let Some(next) = mails[cur].next_thread_mail {
                cur = next;
            }
            mails[cur].next_thread_mail = Some(child_idx);
        }
    }
    mails[child_idx].child_mail = true;
}

/// Detach `removed_idx` from the thread forest before it is removed from
/// the array (spec §4.4 "Remove algorithm"):
/// - any parent whose `sub_thread_mail` is `removed_idx` is replaced by
///   `removed_idx`'s `next_thread_mail`;
/// - any sibling whose `next_thread_mail` is `removed_idx` is replaced
///   likewise;
/// - `removed_idx`'s own children become top-level (their sibling links
///   are cleared, `child_mail` stays accurate per their own parent state).
pub fn unlink_mail(mails: &mut [MailInfo], removed_idx: usize) {
    let next = mails[removed_idx].next_thread_mail;

    for i in 0..mails.len() {
        if i == removed_idx {
            continue;
        }
        if mails[i].sub_thread_mail == Some(removed_idx) {
            mails[i].sub_thread_mail = next;
        }
        if mails[i].next_thread_mail == Some(removed_idx) {
            mails[i].next_thread_mail = next;
        }
    }

    // Children of the removed mail become top-level siblings of nothing;
    // detach them from the chain that passed through `removed_idx`.
    if let Some(first_child) = mails[removed_idx].sub_thread_mail {
        let mut cur = Some(first_child);
        while let Some(idx) = cur {
            let next_sibling = mails[idx].next_thread_mail;
            mails[idx].child_mail = false;
            mails[idx].next_thread_mail = None;
            cur = next_sibling;
        }
    }

    mails[removed_idx].sub_thread_mail = None;
    mails[removed_idx].next_thread_mail = None;
    mails[removed_idx].child_mail = false;
}

/// Shift thread-pointer indices down by one for every index greater than
/// `removed_idx`, to account for `removed_idx` itself being spliced out
/// of the backing array. Call after [`unlink_mail`] and the `Vec::remove`.
pub fn reindex_after_removal(mails: &mut [MailInfo], removed_idx: usize) {
    for m in mails.iter_mut() {
        if let Some(i) = m.sub_thread_mail {
            if i > removed_idx {
                m.sub_thread_mail = Some(i - 1);
            }
        }
        if let Some(i) = m.next_thread_mail {
            if i > removed_idx {
                m.next_thread_mail = Some(i - 1);
            }
        }
    }
}

/// Collect the ordered reply chain reachable from `root_idx`'s
/// `sub_thread_mail` (siblings left to right, each one's own children
/// visited immediately after it), for tests and thread-aware display.
pub fn reply_chain(mails: &[MailInfo], root_idx: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cur = mails[root_idx].sub_thread_mail;
    while let Some(idx) = cur {
        out.push(idx);
        if mails[idx].sub_thread_mail.is_some() {
            out.extend(reply_chain(mails, idx));
        }
        cur = mails[idx].next_thread_mail;
    }
    out
}
