use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;

use crate::model::{ImpactMethod, ScoreTable};

/// Minutes per (activity, method) pair, measured on the reference machine.
pub const MINUTES_PER_CALCULATION: f64 = 0.0083;

/// A pair (or a whole activity, when `method` is `None`) that produced no score.
#[derive(Debug, Clone, Serialize)]
pub struct CalcFailure {
    pub code: String,
    pub method: Option<ImpactMethod>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseOutcome {
    pub database: String,
    pub table: ScoreTable,
    /// Activities attempted after sampling.
    pub activities: usize,
    pub failures: Vec<CalcFailure>,
    pub duration: Duration,
}

impl DatabaseOutcome {
    pub fn calculations(&self) -> usize {
        self.activities * self.table.methods.len()
    }

    /// One-line summary appended to the per-database log.
    pub fn summary_line(&self) -> String {
        format!(
            "Completed {} LCIA calculations: {} activities and {} methods from {} in: {}s ({} failed)",
            self.calculations(),
            self.activities,
            self.table.methods.len(),
            self.database,
            self.duration.as_secs(),
            self.failures.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub databases: Vec<DatabaseOutcome>,
    pub duration: Duration,
}

impl ProjectOutcome {
    pub fn calculations(&self) -> usize {
        self.databases.iter().map(DatabaseOutcome::calculations).sum()
    }

    pub fn failures(&self) -> usize {
        self.databases.iter().map(|d| d.failures.len()).sum()
    }

    /// All per-database tables, in database order.
    pub fn combined(&self) -> ScoreTable {
        ScoreTable::concat(self.databases.iter().map(|d| d.table.clone()).collect())
    }
}

/// Expected size and duration of a run, reported before it starts.
#[derive(Debug, Clone, Serialize)]
pub struct RunEstimate {
    pub databases: usize,
    pub activities: usize,
    pub methods: usize,
    pub calculations: usize,
    pub minutes: f64,
    pub finish: DateTime<Local>,
}

impl RunEstimate {
    /// With a limit, every database contributes exactly `limit` activities.
    pub fn new(
        activities: usize,
        databases: usize,
        methods: usize,
        limit: Option<usize>,
        start: DateTime<Local>,
    ) -> Self {
        let activities = match limit {
            Some(n) => n * databases,
            None => activities,
        };
        let calculations = activities * methods;
        let minutes = calculations as f64 * MINUTES_PER_CALCULATION;
        let finish = start + TimeDelta::seconds((minutes * 60.0).round() as i64);
        RunEstimate {
            databases,
            activities,
            methods,
            calculations,
            minutes,
            finish,
        }
    }

    /// "14:05 today", "09:30 tomorrow" or a full date.
    pub fn finish_display(&self, now: DateTime<Local>) -> String {
        let days = (self.finish.date_naive() - now.date_naive()).num_days();
        match days {
            0 => format!("{} today", self.finish.format("%H:%M")),
            1 => format!("{} tomorrow", self.finish.format("%H:%M")),
            _ => self.finish.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_estimate_scales_with_pairs() {
        let start = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let e = RunEstimate::new(1000, 4, 12, None, start);
        assert_eq!(e.calculations, 12_000);
        assert!((e.minutes - 99.6).abs() < 1e-9);
        assert_eq!(e.finish_display(start), "11:39 today");
    }

    #[test]
    fn test_estimate_with_limit() {
        let start = Local.with_ymd_and_hms(2024, 3, 1, 23, 50, 0).unwrap();
        let e = RunEstimate::new(1000, 4, 12, Some(100), start);
        assert_eq!(e.activities, 400);
        assert!(e.finish_display(start).ends_with("tomorrow"));
    }
}
