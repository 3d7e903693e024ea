//! Actions and side effects (§3 "Result", "Side effect"; GLOSSARY).
//!
//! An [`Action`] is a deferred operation appended by an execute function;
//! it carries its own key for the duplicate-check in [`crate::result`].
//! A [`SideEffect`] augments an action (currently only `:flags`, the
//! `imap4flags` extension's contribution to `keep`/`fileinto`/
//! `redirect`) and merges associatively by unioning its flag set.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// IMAP flags to apply to the stored/kept message (`imap4flags`).
    Flags(Vec<String>),
    /// `:copy`: deliver without cancelling the implicit keep.
    Copy,
}

impl SideEffect {
    pub fn print(&self) -> String {
        match self {
            SideEffect::Flags(flags) => format!(":flags {flags:?}"),
            SideEffect::Copy => ":copy".to_owned(),
        }
    }

    /// Associative merge: flags union (duplicates removed, first-seen
    /// order preserved); `:copy` is idempotent.
    pub fn merge(existing: &mut Vec<SideEffect>, incoming: Vec<SideEffect>) {
        for effect in incoming {
            match effect {
                SideEffect::Copy => {
                    if !existing.contains(&SideEffect::Copy) {
                        existing.push(SideEffect::Copy);
                    }
                }
                SideEffect::Flags(new_flags) => {
                    if let Some(SideEffect::Flags(flags)) =
                        existing.iter_mut().find(|e| matches!(e, SideEffect::Flags(_)))
                    {
                        for f in new_flags {
                            if !flags.contains(&f) {
                                flags.push(f);
                            }
                        }
                    } else {
                        existing.push(SideEffect::Flags(new_flags));
                    }
                }
            }
        }
    }
}

/// Side-effects encoded on the wire as a bare string-list; `:copy`
/// appears as the sentinel `":copy"` entry emitted by the code generator
/// (see `sieve-compile::codegen`), everything else is an IMAP flag name.
pub fn side_effects_from_wire(entries: Vec<String>) -> Vec<SideEffect> {
    let mut flags = Vec::new();
    let mut copy = false;
    for entry in entries {
        if entry == ":copy" {
            copy = true;
        } else {
            flags.push(entry);
        }
    }
    let mut out = Vec::new();
    if !flags.is_empty() {
        out.push(SideEffect::Flags(flags));
    }
    if copy {
        out.push(SideEffect::Copy);
    }
    out
}

/// A deferred action (§3 "Action"). Each variant carries exactly the
/// fields its `check_duplicate`/`merge`/`execute` hooks need; side
/// effects live alongside in [`PendingAction`] rather than inline, since
/// they are attached uniformly by the result accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Keep,
    Discard,
    Redirect { address: String },
    FileInto { mailbox: String },
    Reject { reason: String },
    Vacation { reason: String, subject: String, handle: String, days: u64 },
    Notify { method: String, options: Vec<String>, message: String },
    AddHeader { name: String, value: String },
    DeleteHeader { name: String },
}

impl Action {
    /// Whether this action, once committed, should cancel the implicit
    /// keep (§4.10 "no action provides delivery and no discard").
    pub fn cancels_implicit_keep(&self) -> bool {
        matches!(
            self,
            Action::FileInto { .. } | Action::Redirect { .. } | Action::Discard | Action::Reject { .. }
        )
    }

    /// The key this action dedups/conflicts on, per §4.10 step 1. `None`
    /// means "never merges with a prior action of the same kind"
    /// (addheader/deleteheader: each occurrence is distinct and ordered).
    fn dedup_key(&self) -> Option<String> {
        match self {
            Action::Keep => Some(String::new()),
            Action::Discard => Some(String::new()),
            Action::Redirect { address } => Some(address.to_ascii_lowercase()),
            Action::FileInto { mailbox } => Some(mailbox.clone()),
            Action::Reject { .. } => Some(String::new()),
            Action::Vacation { handle, .. } => Some(handle.clone()),
            Action::Notify { .. } | Action::AddHeader { .. } | Action::DeleteHeader { .. } => None,
        }
    }

    pub fn print(&self) -> String {
        match self {
            Action::Keep => "keep".to_owned(),
            Action::Discard => "discard".to_owned(),
            Action::Redirect { address } => format!("redirect {address:?}"),
            Action::FileInto { mailbox } => format!("fileinto {mailbox:?}"),
            Action::Reject { reason } => format!("reject {reason:?}"),
            Action::Vacation { handle, subject, days, .. } => {
                format!("vacation :handle {handle:?} :subject {subject:?} :days {days}")
            }
            Action::Notify { method, message, .. } => format!("notify {method:?} {message:?}"),
            Action::AddHeader { name, value } => format!("addheader {name:?} {value:?}"),
            Action::DeleteHeader { name } => format!("deleteheader {name:?}"),
        }
    }

    /// Distinguishes this action's variant from `other`'s, ignoring
    /// fields — used so `dedup_key` collisions across different
    /// variants (both default to `""`, e.g. `Keep` vs `Discard`) are
    /// never mistaken for the same action.
    fn same_kind(&self, other: &Action) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

/// Outcome of [`crate::result::ResultAccumulator::add`]'s duplicate
/// check (§4.10 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Merge,
    Replace,
    Conflict,
    Distinct,
}

/// Decide how `new` relates to `existing` when both would occupy the
/// same dedup key. `Keep` vs `Discard` sharing the empty key is the one
/// place two different action kinds must be told apart as a conflict
/// rather than silently merged.
pub fn check_duplicate(existing: &Action, new: &Action) -> DuplicatePolicy {
    if !existing.same_kind(new) {
        if matches!(existing, Action::Keep | Action::Discard)
            && matches!(new, Action::Keep | Action::Discard)
        {
            return DuplicatePolicy::Conflict;
        }
        return DuplicatePolicy::Distinct;
    }
    match (existing, new) {
        (Action::Reject { reason: a }, Action::Reject { reason: b }) if a != b => {
            DuplicatePolicy::Conflict
        }
        _ => DuplicatePolicy::Merge,
    }
}

pub fn dedup_key(action: &Action) -> Option<(std::mem::Discriminant<Action>, String)> {
    action.dedup_key().map(|k| (std::mem::discriminant(action), k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_and_discard_share_empty_key_but_conflict() {
        assert_eq!(check_duplicate(&Action::Keep, &Action::Discard), DuplicatePolicy::Conflict);
    }

    #[test]
    fn same_mailbox_fileinto_merges() {
        let a = Action::FileInto { mailbox: "Junk".into() };
        let b = Action::FileInto { mailbox: "Junk".into() };
        assert_eq!(check_duplicate(&a, &b), DuplicatePolicy::Merge);
    }

    #[test]
    fn different_mailbox_fileinto_is_distinct_key() {
        let a = Action::FileInto { mailbox: "Junk".into() };
        let b = Action::FileInto { mailbox: "Inbox".into() };
        assert_ne!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn conflicting_reject_reasons_conflict() {
        let a = Action::Reject { reason: "no".into() };
        let b = Action::Reject { reason: "nope".into() };
        assert_eq!(check_duplicate(&a, &b), DuplicatePolicy::Conflict);
    }

    #[test]
    fn side_effects_merge_unions_flags() {
        let mut existing = vec![SideEffect::Flags(vec!["\\Seen".into()])];
        SideEffect::merge(&mut existing, vec![SideEffect::Flags(vec!["\\Seen".into(), "\\Flagged".into()])]);
        assert_eq!(existing, vec![SideEffect::Flags(vec!["\\Seen".into(), "\\Flagged".into()])]);
    }

    #[test]
    fn wire_side_effects_split_copy_from_flags() {
        let effects = side_effects_from_wire(vec!["\\Seen".into(), ":copy".into()]);
        assert_eq!(effects, vec![SideEffect::Flags(vec!["\\Seen".into()]), SideEffect::Copy]);
    }
}
