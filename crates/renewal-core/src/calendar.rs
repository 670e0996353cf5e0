//! Calendar arithmetic for billing schedules.
//!
//! A billing date advances "same day-of-month, one calendar month later". When
//! the target month is shorter than the account's anchor day the date is
//! clamped to the last day of that month, and the anchor is restored in later
//! months: an account anchored on the 31st bills Jan 31, Feb 28, Mar 31, Apr 30.

use chrono::{Datelike, NaiveDate};

use crate::error::{BillingError, Result};

/// Last valid day of the given month, or `None` when the month (or the month
/// after it) is outside the representable range.
#[must_use]
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt().map(|d| d.day())
}

/// Advance a billing date by one calendar month, aiming for `anchor_day`.
///
/// # Errors
///
/// Returns `BillingError::DateOverflow` if the resulting month cannot be
/// represented.
pub fn advance_one_month(current: NaiveDate, anchor_day: u32) -> Result<NaiveDate> {
    let overflow = || BillingError::DateOverflow { from: current };

    let (year, month) = if current.month() == 12 {
        (current.year().checked_add(1).ok_or_else(overflow)?, 1)
    } else {
        (current.year(), current.month() + 1)
    };

    let last = last_day_of_month(year, month).ok_or_else(overflow)?;
    let day = anchor_day.clamp(1, last);

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn plain_advance_keeps_day() {
        assert_eq!(advance_one_month(date(2025, 3, 15), 15).unwrap(), date(2025, 4, 15));
    }

    #[test]
    fn december_rolls_into_next_year() {
        assert_eq!(advance_one_month(date(2025, 12, 10), 10).unwrap(), date(2026, 1, 10));
        assert_eq!(advance_one_month(date(2025, 12, 31), 31).unwrap(), date(2026, 1, 31));
    }

    #[test]
    fn late_january_days_clamp_into_february_non_leap() {
        for day in [29, 30, 31] {
            assert_eq!(
                advance_one_month(date(2025, 1, day), day).unwrap(),
                date(2025, 2, 28),
                "day {day}"
            );
        }
    }

    #[test]
    fn late_january_days_clamp_into_february_leap() {
        assert_eq!(advance_one_month(date(2024, 1, 29), 29).unwrap(), date(2024, 2, 29));
        assert_eq!(advance_one_month(date(2024, 1, 30), 30).unwrap(), date(2024, 2, 29));
        assert_eq!(advance_one_month(date(2024, 1, 31), 31).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn anchor_is_restored_after_short_month() {
        let feb = advance_one_month(date(2025, 1, 31), 31).unwrap();
        let mar = advance_one_month(feb, 31).unwrap();
        let apr = advance_one_month(mar, 31).unwrap();
        assert_eq!(mar, date(2025, 3, 31));
        assert_eq!(apr, date(2025, 4, 30));

        let feb = advance_one_month(date(2025, 1, 29), 29).unwrap();
        assert_eq!(advance_one_month(feb, 29).unwrap(), date(2025, 3, 29));
    }

    #[test]
    fn thirty_first_into_thirty_day_month() {
        assert_eq!(advance_one_month(date(2025, 5, 31), 31).unwrap(), date(2025, 6, 30));
    }

    #[test]
    fn last_day_of_month_values() {
        assert_eq!(last_day_of_month(2025, 2), Some(28));
        assert_eq!(last_day_of_month(2024, 2), Some(29));
        assert_eq!(last_day_of_month(1900, 2), Some(28));
        assert_eq!(last_day_of_month(2000, 2), Some(29));
        assert_eq!(last_day_of_month(2025, 12), Some(31));
        assert_eq!(last_day_of_month(2025, 4), Some(30));
    }

    #[test]
    fn overflow_is_reported() {
        let max = NaiveDate::MAX;
        assert_eq!(
            advance_one_month(max, max.day()),
            Err(BillingError::DateOverflow { from: max })
        );
    }
}
