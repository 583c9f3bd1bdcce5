// src/policy.rs

use chrono::{DateTime, Utc};

/// Sentinel carried through API responses for "no limit".
pub const UNLIMITED: i64 = -1;

pub const FREE_DAILY_PRACTICE_LIMIT: i64 = 15;
pub const FREE_MAX_QUESTIONS_PER_EXAM: i64 = 20;
pub const FREE_MONTHLY_EXAM_LIMIT: i64 = 3;
pub const FREE_DAILY_EXPLANATION_LIMIT: i64 = 3;

/// The full mock exam mirrors the real test paper.
pub const PREMIUM_MAX_QUESTIONS_PER_EXAM: i64 = 170;

/// The limit set currently in force for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub practice_daily: i64,
    pub max_questions_per_exam: i64,
    pub exams_monthly: i64,
    pub explanation_daily: i64,
}

/// A premium flag only counts while unexpired; a null expiry means the pass
/// never lapses.
pub fn is_effective_premium(
    is_premium: bool,
    premium_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    is_premium && premium_expiry.is_none_or(|expiry| expiry > now)
}

/// Derives the entitlement limits from a user's premium flags.
pub fn limits_for(
    is_premium: bool,
    premium_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Limits {
    if is_effective_premium(is_premium, premium_expiry, now) {
        Limits {
            practice_daily: UNLIMITED,
            max_questions_per_exam: PREMIUM_MAX_QUESTIONS_PER_EXAM,
            exams_monthly: UNLIMITED,
            explanation_daily: UNLIMITED,
        }
    } else {
        Limits {
            practice_daily: FREE_DAILY_PRACTICE_LIMIT,
            max_questions_per_exam: FREE_MAX_QUESTIONS_PER_EXAM,
            exams_monthly: FREE_MONTHLY_EXAM_LIMIT,
            explanation_daily: FREE_DAILY_EXPLANATION_LIMIT,
        }
    }
}

/// True when a finite limit is used up. An `UNLIMITED` limit never trips.
pub fn limit_reached(limit: i64, used: i64) -> bool {
    limit != UNLIMITED && used >= limit
}

/// What the client may still consume today; `UNLIMITED` passes through.
pub fn remaining(limit: i64, used: i64) -> i64 {
    if limit == UNLIMITED {
        UNLIMITED
    } else {
        (limit - used).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn free_tier_limits() {
        let limits = limits_for(false, None, Utc::now());
        assert_eq!(limits.practice_daily, 15);
        assert_eq!(limits.max_questions_per_exam, 20);
        assert_eq!(limits.exams_monthly, 3);
        assert_eq!(limits.explanation_daily, 3);
    }

    #[test]
    fn premium_without_expiry_is_unlimited() {
        let limits = limits_for(true, None, Utc::now());
        assert_eq!(limits.practice_daily, UNLIMITED);
        assert_eq!(limits.max_questions_per_exam, 170);
        assert_eq!(limits.exams_monthly, UNLIMITED);
        assert_eq!(limits.explanation_daily, UNLIMITED);
    }

    #[test]
    fn premium_with_future_expiry_holds() {
        let now = Utc::now();
        assert!(is_effective_premium(true, Some(now + Duration::days(30)), now));
    }

    #[test]
    fn expired_premium_falls_back_to_free_tier() {
        let now = Utc::now();
        let limits = limits_for(true, Some(now - Duration::seconds(1)), now);
        assert_eq!(limits.practice_daily, FREE_DAILY_PRACTICE_LIMIT);
    }

    #[test]
    fn limit_reached_ignores_unlimited() {
        assert!(!limit_reached(UNLIMITED, 1_000_000));
        assert!(limit_reached(15, 15));
        assert!(!limit_reached(15, 14));
    }

    #[test]
    fn remaining_clamps_at_zero() {
        assert_eq!(remaining(15, 20), 0);
        assert_eq!(remaining(15, 10), 5);
        assert_eq!(remaining(UNLIMITED, 10), UNLIMITED);
    }
}
