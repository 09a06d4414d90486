//! Progress statistics over workout history.
//!
//! Streaks are counted in whole UTC calendar days: any number of workouts
//! on one day counts once.

use crate::CompletionRecord;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregated view of a user's history
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ProgressStats {
    pub total_workouts: usize,
    pub completed: usize,
    pub ended_early: usize,
    pub total_minutes: f64,
    pub average_minutes: f64,
    pub last_7_days: usize,
    /// Consecutive days ending today, or yesterday if nothing was done today
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    /// Shortest full (not early) completion per plan id
    pub best_minutes_by_plan: BTreeMap<String, f64>,
}

/// Summarize `records` as of `today`
pub fn summarize(records: &[CompletionRecord], today: NaiveDate) -> ProgressStats {
    if records.is_empty() {
        return ProgressStats::default();
    }

    let total_minutes: f64 = records.iter().map(|r| r.duration_minutes).sum();
    let ended_early = records.iter().filter(|r| r.early).count();
    let week_start = today - Duration::days(6);

    let mut best_minutes_by_plan: BTreeMap<String, f64> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.early) {
        best_minutes_by_plan
            .entry(record.plan_id.clone())
            .and_modify(|best| *best = best.min(record.duration_minutes))
            .or_insert(record.duration_minutes);
    }

    let days: BTreeSet<NaiveDate> = records
        .iter()
        .map(|r| r.completed_at.date_naive())
        .collect();

    ProgressStats {
        total_workouts: records.len(),
        completed: records.len() - ended_early,
        ended_early,
        total_minutes,
        average_minutes: total_minutes / records.len() as f64,
        last_7_days: records
            .iter()
            .filter(|r| {
                let day = r.completed_at.date_naive();
                day >= week_start && day <= today
            })
            .count(),
        current_streak_days: current_streak(&days, today),
        longest_streak_days: longest_streak(&days),
        best_minutes_by_plan,
    }
}

fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::create_test_record;
    use chrono::{TimeZone, Utc};

    fn record_on(plan_id: &str, day: NaiveDate, minutes: f64, early: bool) -> CompletionRecord {
        let mut record = create_test_record(plan_id, 0);
        record.completed_at = Utc.from_utc_datetime(&day.and_hms_opt(18, 0, 0).unwrap());
        record.duration_minutes = minutes;
        record.early = early;
        record
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_empty_history() {
        let stats = summarize(&[], day(10));
        assert_eq!(stats, ProgressStats::default());
    }

    #[test]
    fn test_totals_and_best_times() {
        let records = vec![
            record_on("hiit", day(1), 20.0, false),
            record_on("hiit", day(2), 18.0, false),
            record_on("hiit", day(3), 5.0, true),
            record_on("core", day(3), 12.0, false),
        ];

        let stats = summarize(&records, day(3));
        assert_eq!(stats.total_workouts, 4);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.ended_early, 1);
        assert!((stats.total_minutes - 55.0).abs() < 1e-9);
        assert!((stats.average_minutes - 13.75).abs() < 1e-9);
        assert_eq!(stats.best_minutes_by_plan.get("hiit"), Some(&18.0));
        assert_eq!(stats.best_minutes_by_plan.get("core"), Some(&12.0));
    }

    #[test]
    fn test_last_seven_days_window() {
        let records = vec![
            record_on("a", day(1), 10.0, false),
            record_on("a", day(4), 10.0, false),
            record_on("a", day(10), 10.0, false),
        ];

        // Window for the 10th is the 4th through the 10th
        assert_eq!(summarize(&records, day(10)).last_7_days, 2);
    }

    #[test]
    fn test_streaks() {
        let records = vec![
            record_on("a", day(1), 10.0, false),
            record_on("a", day(2), 10.0, false),
            record_on("a", day(3), 10.0, false),
            record_on("a", day(3), 10.0, false),
            record_on("a", day(7), 10.0, false),
            record_on("a", day(8), 10.0, false),
        ];

        let stats = summarize(&records, day(9));
        assert_eq!(stats.longest_streak_days, 3);
        // Nothing today, but yesterday keeps the streak alive
        assert_eq!(stats.current_streak_days, 2);

        let stats = summarize(&records, day(10));
        assert_eq!(stats.current_streak_days, 0);
    }
}
