//! Fund allocation between charity projects and donations.
//!
//! A newly created entry (the *target*) is matched against the queue of open
//! counter-entries, oldest first. Each step moves
//! `min(target need, counter-entry capacity)` to both sides:
//!
//! ```text
//! target need:   300            counter capacities: [100, 150, 400]
//! step 1:        300 - 100 = 200    [closed, 150, 400]
//! step 2:        200 - 150 =  50    [closed, closed, 400]
//! step 3:         50 -  50 =   0    [closed, closed, 350]  target closed, stop
//! ```
//!
//! The procedure is pure. Persisting the result is the caller's job
//! (see [`crate::db`]).

use chrono::NaiveDateTime;

use crate::models::{CharityProject, Donation};

/// Anything that holds a funding amount and can be filled up: a project
/// (funds needed) or a donation (funds available).
pub trait Investable {
    fn full_amount(&self) -> i64;
    fn invested_amount(&self) -> i64;
    fn fully_invested(&self) -> bool;
    fn close_date(&self) -> Option<NaiveDateTime>;

    /// Add `amount` to the invested total.
    fn add_invested(&mut self, amount: i64);

    /// Mark the entry fully invested. Only the first call records `now`.
    fn close(&mut self, now: NaiveDateTime);

    /// Amount still missing until the entry is fully invested.
    fn remaining(&self) -> i64 {
        self.full_amount() - self.invested_amount()
    }
}

macro_rules! impl_investable {
    ($ty:ty) => {
        impl Investable for $ty {
            fn full_amount(&self) -> i64 {
                self.full_amount
            }

            fn invested_amount(&self) -> i64 {
                self.invested_amount
            }

            fn fully_invested(&self) -> bool {
                self.fully_invested
            }

            fn close_date(&self) -> Option<NaiveDateTime> {
                self.close_date
            }

            fn add_invested(&mut self, amount: i64) {
                self.invested_amount += amount;
            }

            fn close(&mut self, now: NaiveDateTime) {
                self.fully_invested = true;
                if self.close_date.is_none() {
                    self.close_date = Some(now);
                }
            }
        }
    };
}

impl_investable!(CharityProject);
impl_investable!(Donation);

/// Outcome of a single [`invest`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Total amount moved from one side to the other.
    pub transferred: i64,
    /// Indices of counter-entries that received a non-zero share, in order.
    pub touched: Vec<usize>,
    /// Indices of counter-entries closed by this run, in the order they closed.
    pub closed: Vec<usize>,
    /// Whether the target is fully invested after the run.
    pub target_closed: bool,
}

/// Greedily distribute `target`'s remaining amount across `counters`.
///
/// `counters` must be ordered oldest first. Entries that are already fully
/// invested are skipped. Every entry closed by this call gets `now` as its
/// close date.
pub fn invest<T, C>(target: &mut T, counters: &mut [C], now: NaiveDateTime) -> Allocation
where
    T: Investable,
    C: Investable,
{
    let mut allocation = Allocation::default();

    if !target.fully_invested() {
        for (index, counter) in counters.iter_mut().enumerate() {
            let need = target.remaining();
            if need <= 0 {
                break;
            }
            if counter.fully_invested() {
                continue;
            }

            let share = need.min(counter.remaining());
            if share <= 0 {
                continue;
            }

            counter.add_invested(share);
            target.add_invested(share);
            allocation.transferred += share;
            allocation.touched.push(index);

            if counter.remaining() == 0 {
                counter.close(now);
                allocation.closed.push(index);
            }
            if target.remaining() == 0 {
                target.close(now);
                break;
            }
        }
    }

    if !target.fully_invested() && target.remaining() <= 0 {
        target.close(now);
    }
    allocation.target_closed = target.fully_invested();
    allocation
}
