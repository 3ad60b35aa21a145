/// Locally cached read of the player's ledger balance.
///
/// Refreshes are numbered when requested; a result older than the newest one
/// already applied is dropped, so concurrent refreshes cannot roll the view
/// back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceView {
    cached: Option<u64>,
    next_seq: u64,
    applied_seq: Option<u64>,
}

impl BalanceView {
    pub fn cached(&self) -> Option<u64> {
        self.cached
    }

    pub fn begin_refresh(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Returns whether the result was applied.
    pub fn apply(&mut self, seq: u64, balance: u64) -> bool {
        if self.applied_seq.is_some_and(|applied| seq < applied) {
            return false;
        }
        self.applied_seq = Some(seq);
        self.cached = Some(balance);
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn apply__stale_result__ignored() {
        // given
        let mut view = BalanceView::default();
        let older = view.begin_refresh();
        let newer = view.begin_refresh();
        assert!(view.apply(newer, 80));

        // when
        let applied = view.apply(older, 100);

        // then
        assert!(!applied);
        assert_eq!(view.cached(), Some(80));
    }

    #[test]
    fn apply__same_balance_twice__view_unchanged() {
        let mut view = BalanceView::default();
        let first = view.begin_refresh();
        view.apply(first, 42);
        let before = view.cached();
        let second = view.begin_refresh();
        view.apply(second, 42);
        assert_eq!(view.cached(), before);
    }
}
