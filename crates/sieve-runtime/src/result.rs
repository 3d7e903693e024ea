//! The result/action accumulator (§4.10): the interpreter's single
//! writer for every `Action`, enforcing the dedup/merge/conflict rules
//! and the implicit-keep commit protocol.

use crate::actions::{check_duplicate, dedup_key, Action, DuplicatePolicy, SideEffect};
use crate::error::{Result, RuntimeError};

/// One entry in the committed result set: the action plus whatever side
/// effects (`:flags`, `:copy`) accumulated onto it across every command
/// that contributed to the same dedup key.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub action: Action,
    pub effects: Vec<SideEffect>,
}

/// Consulted at commit time for actions the storage/host layer wants
/// deduplicated across separate script executions (`vacation`'s
/// `:handle`, per §4.10 Scenario B) rather than merely within one run.
/// The in-crate default is a no-op (every handle looks fresh); hosts
/// that want real cross-execution suppression implement this against
/// their own message-attribute store.
pub trait DuplicateTracker {
    fn seen_recently(&mut self, handle: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct NoopDuplicateTracker;

impl DuplicateTracker for NoopDuplicateTracker {
    fn seen_recently(&mut self, _handle: &str) -> bool {
        false
    }
}

/// Accumulates actions during one script execution and commits them
/// (§4.10 step 2: "apply implicit keep iff no action in the committed
/// set cancels it").
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    pending: Vec<PendingAction>,
    redirect_count: u32,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    /// Add `action` with its side effects, applying the dedup/merge/
    /// conflict rule (§4.10 step 1) against whatever already occupies
    /// its key. Actions without a dedup key (`notify`, `addheader`,
    /// `deleteheader`) are always appended, preserving document order.
    pub fn add(&mut self, action: Action, effects: Vec<SideEffect>, max_redirects: u32) -> Result<()> {
        if matches!(action, Action::Redirect { .. }) {
            self.redirect_count += 1;
            if self.redirect_count > max_redirects {
                return Err(RuntimeError::RedirectLimitExceeded(max_redirects));
            }
        }
        let Some(key) = dedup_key(&action) else {
            self.pending.push(PendingAction { action, effects });
            return Ok(());
        };
        if let Some(slot) = self
            .pending
            .iter_mut()
            .find(|p| dedup_key(&p.action).as_ref() == Some(&key))
        {
            match check_duplicate(&slot.action, &action) {
                DuplicatePolicy::Merge => {
                    SideEffect::merge(&mut slot.effects, effects);
                }
                DuplicatePolicy::Replace => {
                    slot.action = action;
                    SideEffect::merge(&mut slot.effects, effects);
                }
                DuplicatePolicy::Conflict => {
                    return Err(RuntimeError::ActionConflict(format!(
                        "{} conflicts with already-committed {}",
                        action, slot.action
                    )));
                }
                DuplicatePolicy::Distinct => unreachable!("same dedup key implies same or mergeable kind"),
            }
            return Ok(());
        }
        // Cross-kind conflict check: `keep` and `discard` share the empty
        // key only with each other, already handled above via dedup_key
        // equality, but `fileinto`/`redirect`/`reject` do not share keys
        // with `keep`/`discard` at all, so their interaction is purely
        // about cancelling the implicit keep at commit, not a conflict.
        self.pending.push(PendingAction { action, effects });
        Ok(())
    }

    /// Finalize the action list: append an implicit `keep` unless some
    /// committed action cancels it (§4.10 step 2). The implicit keep picks
    /// up whatever `addflag`/`setflag` left in the imap4flags register,
    /// same as an explicit `keep` with no `:flags` tag (RFC 5232 §3).
    pub fn commit(mut self, implicit_flags: &[String]) -> Vec<PendingAction> {
        let cancelled = self.pending.iter().any(|p| p.action.cancels_implicit_keep());
        if !cancelled && !self.pending.iter().any(|p| matches!(p.action, Action::Keep)) {
            let effects = if implicit_flags.is_empty() {
                Vec::new()
            } else {
                vec![SideEffect::Flags(implicit_flags.to_vec())]
            };
            self.pending.push(PendingAction { action: Action::Keep, effects });
        }
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_script_gets_implicit_keep() {
        let acc = ResultAccumulator::new();
        let committed = acc.commit(&[]);
        assert_eq!(committed.len(), 1);
        assert!(matches!(committed[0].action, Action::Keep));
    }

    #[test]
    fn fileinto_cancels_implicit_keep() {
        let mut acc = ResultAccumulator::new();
        acc.add(Action::FileInto { mailbox: "Junk".into() }, Vec::new(), 8).unwrap();
        let committed = acc.commit(&[]);
        assert_eq!(committed.len(), 1);
        assert!(matches!(committed[0].action, Action::FileInto { .. }));
    }

    #[test]
    fn repeated_vacation_same_handle_merges_not_duplicates() {
        let mut acc = ResultAccumulator::new();
        let v = || Action::Vacation {
            reason: "away".into(),
            subject: "Away".into(),
            handle: "h1".into(),
            days: 7,
        };
        acc.add(v(), Vec::new(), 8).unwrap();
        acc.add(v(), Vec::new(), 8).unwrap();
        let committed = acc.commit(&[]);
        assert_eq!(committed.iter().filter(|p| matches!(p.action, Action::Vacation { .. })).count(), 1);
    }

    #[test]
    fn keep_then_discard_conflicts() {
        let mut acc = ResultAccumulator::new();
        acc.add(Action::Keep, Vec::new(), 8).unwrap();
        let err = acc.add(Action::Discard, Vec::new(), 8).unwrap_err();
        assert!(matches!(err, RuntimeError::ActionConflict(_)));
    }

    #[test]
    fn redirect_limit_enforced() {
        let mut acc = ResultAccumulator::new();
        for i in 0..2 {
            acc.add(Action::Redirect { address: format!("a{i}@example.com") }, Vec::new(), 2)
                .unwrap();
        }
        let err = acc
            .add(Action::Redirect { address: "d@example.com".into() }, Vec::new(), 2)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::RedirectLimitExceeded(2)));
    }
}
