//! Assertions over funding entries, shared by the allocation and database tests.

use crate::investment::Investable;

/// Invested amount stays within `0..=full_amount`.
pub fn assert_amount_bounds<T: Investable>(entry: &T) {
    assert!(
        entry.invested_amount() >= 0,
        "invested amount is negative ({})",
        entry.invested_amount()
    );
    assert!(
        entry.invested_amount() <= entry.full_amount(),
        "invested amount {} exceeds full amount {}",
        entry.invested_amount(),
        entry.full_amount()
    );
}

/// `fully_invested` holds exactly when the entry is full.
pub fn assert_closed_iff_full<T: Investable>(entry: &T) {
    assert_eq!(
        entry.fully_invested(),
        entry.invested_amount() == entry.full_amount(),
        "fully_invested = {} but invested {} of {}",
        entry.fully_invested(),
        entry.invested_amount(),
        entry.full_amount()
    );
}

/// A close date exists exactly when the entry is closed.
pub fn assert_close_date_consistent<T: Investable>(entry: &T) {
    assert_eq!(
        entry.fully_invested(),
        entry.close_date().is_some(),
        "fully_invested = {} but close_date = {:?}",
        entry.fully_invested(),
        entry.close_date()
    );
}

/// A close date, once recorded, never changes or disappears.
pub fn assert_close_date_preserved<T: Investable>(before: &T, after: &T) {
    if let Some(closed_at) = before.close_date() {
        assert_eq!(
            after.close_date(),
            Some(closed_at),
            "close date changed after the entry was closed"
        );
    }
}

/// Money moved into one side equals money moved out of the other.
pub fn assert_conservation(target_delta: i64, counters_delta: i64) {
    assert_eq!(
        target_delta, counters_delta,
        "allocation not conserved: target gained {target_delta}, counters gained {counters_delta}"
    );
}

/// Run all stateless entry invariants.
pub fn assert_all_entry_invariants<T: Investable>(entry: &T) {
    assert_amount_bounds(entry);
    assert_closed_iff_full(entry);
    assert_close_date_consistent(entry);
}
