//! Fallback signup count.
//!
//! When the authoritative count is unreachable or forbidden, the page still
//! needs a plausible number that creeps upward over time instead of showing
//! zero or freezing. This is an approximation, never a ledger: once the remote
//! store answers again its count takes over (through `max(authoritative,
//! estimate)` in the repository).

use std::ops::{Range, RangeInclusive};

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;

/// Count on the start date.
pub const DEFAULT_BASE: u64 = 12_847;

/// Day the growth curve starts from.
pub const DEFAULT_START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2024, 1, 1) {
    Some(date) => date,
    None => NaiveDate::MIN,
};

/// Signups added per elapsed day, drawn per estimate.
const DAILY_GROWTH: RangeInclusive<u64> = 15..=25;

/// Extra signups for the current day, drawn per estimate.
const TODAY_BONUS: Range<u64> = 0..50;

/// `base + days_since(start) * daily_growth + today_bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountEstimator {
    base: u64,
    start_date: NaiveDate,
}

impl Default for CountEstimator {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            start_date: DEFAULT_START_DATE,
        }
    }
}

impl CountEstimator {
    #[must_use]
    pub const fn new(base: u64, start_date: NaiveDate) -> Self {
        Self { base, start_date }
    }

    /// Estimate for right now using the thread-local RNG.
    #[must_use]
    pub fn estimate(&self) -> u64 {
        self.estimate_at(Utc::now(), &mut rand::rng())
    }

    /// Estimate for `now` drawing from `rng`.
    pub fn estimate_at<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> u64 {
        let days = self.days_since_start(now);
        let daily_growth = rng.random_range(DAILY_GROWTH);
        let today_bonus = rng.random_range(TODAY_BONUS);

        self.base
            .saturating_add(days.saturating_mul(daily_growth))
            .saturating_add(today_bonus)
    }

    /// Whole days between the start date and `now`, zero before the start.
    #[must_use]
    pub fn days_since_start(&self, now: DateTime<Utc>) -> u64 {
        let days = (now.date_naive() - self.start_date).num_days();
        u64::try_from(days).unwrap_or(0)
    }
}
