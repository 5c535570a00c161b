//! Daily API usage tracking and status snapshots.

use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::resilience::RateBudget;

#[derive(Debug)]
struct Daily {
    date: NaiveDate,
    count: u64,
}

/// On-disk form of the daily count.
#[derive(Debug, Serialize, Deserialize)]
struct UsageRecord {
    date: NaiveDate,
    requests: u64,
}

/// Counts API requests per local calendar day.
#[derive(Debug)]
pub struct UsageTracker {
    daily: Mutex<Daily>,
    warning_threshold: u64,
}

impl UsageTracker {
    pub fn new(warning_threshold: u64) -> Self {
        Self {
            daily: Mutex::new(Daily {
                date: Local::now().date_naive(),
                count: 0,
            }),
            warning_threshold,
        }
    }

    /// Tracker resuming today's count from `path`. A missing file, a file
    /// from an earlier day or an unreadable file starts from zero.
    pub fn load(path: &Path, warning_threshold: u64) -> Self {
        Self::load_on(path, warning_threshold, Local::now().date_naive())
    }

    fn load_on(path: &Path, warning_threshold: u64, today: NaiveDate) -> Self {
        let count = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<UsageRecord>(&text) {
                Ok(record) if record.date == today => record.requests,
                Ok(_) => 0,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable usage file");
                    0
                }
            },
            Err(_) => 0,
        };

        Self {
            daily: Mutex::new(Daily { date: today, count }),
            warning_threshold,
        }
    }

    /// Write today's count to `path`.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let record = {
            let daily = self.daily.lock().unwrap_or_else(|e| e.into_inner());
            UsageRecord {
                date: daily.date,
                requests: daily.count,
            }
        };
        let json = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Count one request made today; returns today's total.
    pub fn track_request(&self) -> u64 {
        self.track_request_on(Local::now().date_naive())
    }

    /// Count one request made on `today`, resetting when the date changed.
    pub fn track_request_on(&self, today: NaiveDate) -> u64 {
        let mut daily = self.daily.lock().unwrap_or_else(|e| e.into_inner());
        if daily.date != today {
            daily.date = today;
            daily.count = 0;
        }
        daily.count += 1;

        if daily.count > self.warning_threshold {
            tracing::warn!(
                requests_today = daily.count,
                threshold = self.warning_threshold,
                "High API usage today"
            );
        }
        daily.count
    }

    pub fn requests_today(&self) -> u64 {
        self.daily.lock().unwrap_or_else(|e| e.into_inner()).count
    }
}

/// Occupancy of one rate budget.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub name: String,
    pub recorded_in_window: usize,
    pub max_operations: u32,
    pub window_secs: u64,
}

impl BudgetStatus {
    pub fn of(budget: &RateBudget, now: Instant) -> Self {
        Self {
            name: budget.name().to_string(),
            recorded_in_window: budget.recorded_in_window(now),
            max_operations: budget.max_operations(),
            window_secs: budget.window().as_secs(),
        }
    }
}

/// Snapshot printed by `status` and at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ApiStatus {
    pub requests_today: u64,
    pub budgets: Vec<BudgetStatus>,
}

impl ApiStatus {
    pub fn capture(usage: &UsageTracker, budgets: &[&RateBudget]) -> Self {
        let now = Instant::now();
        Self {
            requests_today: usage.requests_today(),
            budgets: budgets.iter().map(|b| BudgetStatus::of(b, now)).collect(),
        }
    }
}
