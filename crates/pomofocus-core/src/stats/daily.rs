//! Daily focus metrics.
//!
//! Groups stored sessions by the local calendar date of `created_at` and
//! derives per-day summaries: today, yesterday, and a trailing window of
//! days ending today. Everything here is a pure function of the session list
//! and a reference instant.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionStatus};

/// Default length of the trailing window.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Summary of one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub total_sessions: u32,
    pub clean_sessions: u32,
    pub abandoned_sessions: u32,
    pub total_distractions: u32,
    pub average_distractions: f64,
    pub total_focus_time_minutes: f64,
    pub distractions_per_hour: f64,
    /// The day's sessions, in input order.
    pub sessions: Vec<Session>,
}

impl DailyMetrics {
    /// All-zero summary for a day without sessions.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_sessions: 0,
            clean_sessions: 0,
            abandoned_sessions: 0,
            total_distractions: 0,
            average_distractions: 0.0,
            total_focus_time_minutes: 0.0,
            distractions_per_hour: 0.0,
            sessions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_sessions == 0
    }
}

/// Sums over a run of days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub days: u32,
    pub total_sessions: u32,
    pub clean_sessions: u32,
    pub abandoned_sessions: u32,
    pub total_distractions: u32,
    pub total_focus_time_minutes: f64,
}

/// Everything the stats views need from one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub today: Option<DailyMetrics>,
    pub yesterday: Option<DailyMetrics>,
    /// Oldest first, one entry per day, empty days included.
    pub window: Vec<DailyMetrics>,
    pub all_sessions: Vec<Session>,
}

/// Daily metrics aggregator.
#[derive(Debug, Clone)]
pub struct DailyMetricsAnalyzer {
    window_days: u32,
}

impl Default for DailyMetricsAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS)
    }
}

impl DailyMetricsAnalyzer {
    /// Create an analyzer with the given trailing window (at least one day).
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days: window_days.max(1),
        }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Bucket sessions by the local date of `created_at` in `tz`.
    pub fn group_by_local_date<Tz: TimeZone>(
        &self,
        sessions: &[Session],
        tz: &Tz,
    ) -> BTreeMap<NaiveDate, Vec<Session>> {
        let mut buckets: BTreeMap<NaiveDate, Vec<Session>> = BTreeMap::new();
        for session in sessions {
            let date = session.created_at.with_timezone(tz).date_naive();
            buckets.entry(date).or_default().push(session.clone());
        }
        buckets
    }

    /// Summarize one bucket.
    pub fn summarize(&self, date: NaiveDate, sessions: Vec<Session>) -> DailyMetrics {
        if sessions.is_empty() {
            return DailyMetrics::empty(date);
        }

        let total_sessions = count(sessions.len());
        let clean_sessions = count(
            sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Clean)
                .count(),
        );
        let abandoned_sessions = count(
            sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Abandoned)
                .count(),
        );
        let total_distractions = sessions
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.distraction_count));
        let total_focus_time_minutes: f64 = sessions.iter().map(Session::focus_minutes).sum();

        let average_distractions = f64::from(total_distractions) / f64::from(total_sessions);
        let distractions_per_hour = if total_focus_time_minutes > 0.0 {
            f64::from(total_distractions) * 60.0 / total_focus_time_minutes
        } else {
            0.0
        };

        DailyMetrics {
            date,
            total_sessions,
            clean_sessions,
            abandoned_sessions,
            total_distractions,
            average_distractions,
            total_focus_time_minutes,
            distractions_per_hour,
            sessions,
        }
    }

    /// Aggregate `sessions` relative to `reference`, whose timezone defines
    /// the calendar days.
    pub fn build_report<Tz: TimeZone>(
        &self,
        sessions: &[Session],
        reference: &DateTime<Tz>,
    ) -> MetricsReport {
        let buckets = self.group_by_local_date(sessions, &reference.timezone());
        let today = reference.date_naive();

        let day = |date: NaiveDate| {
            let bucket = buckets.get(&date).cloned().unwrap_or_default();
            self.summarize(date, bucket)
        };

        let window: Vec<DailyMetrics> = (0..u64::from(self.window_days))
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(day)
            .collect();

        let today_metrics = Some(day(today)).filter(|m| !m.is_empty());
        let yesterday_metrics = today.pred_opt().map(day).filter(|m| !m.is_empty());

        MetricsReport {
            today: today_metrics,
            yesterday: yesterday_metrics,
            window,
            all_sessions: sessions.to_vec(),
        }
    }

    /// Sum a run of days.
    pub fn window_totals(days: &[DailyMetrics]) -> WindowTotals {
        days.iter().fold(
            WindowTotals {
                days: count(days.len()),
                ..WindowTotals::default()
            },
            |mut acc, day| {
                acc.total_sessions += day.total_sessions;
                acc.clean_sessions += day.clean_sessions;
                acc.abandoned_sessions += day.abandoned_sessions;
                acc.total_distractions =
                    acc.total_distractions.saturating_add(day.total_distractions);
                acc.total_focus_time_minutes += day.total_focus_time_minutes;
                acc
            },
        )
    }

    /// Render a report as plain text.
    pub fn render_text(&self, report: &MetricsReport) -> String {
        let mut output = String::new();

        output.push_str("\nFocus Metrics\n");
        output.push_str(&"=".repeat(60));
        output.push('\n');

        render_day(&mut output, "Today", report.today.as_ref());
        render_day(&mut output, "Yesterday", report.yesterday.as_ref());

        output.push_str(&render_window(&report.window));

        output
    }
}

/// Render a day summary block, or a placeholder when there is no data.
pub fn render_day(output: &mut String, label: &str, day: Option<&DailyMetrics>) {
    output.push_str(&format!("\n{label}\n"));
    let Some(day) = day else {
        output.push_str("  No sessions.\n");
        return;
    };
    output.push_str(&format!(
        "  Sessions:         {} ({} clean, {} abandoned)\n",
        day.total_sessions, day.clean_sessions, day.abandoned_sessions
    ));
    output.push_str(&format!(
        "  Distractions:     {} (avg {:.1})\n",
        day.total_distractions, day.average_distractions
    ));
    output.push_str(&format!(
        "  Focus time:       {}\n",
        format_minutes(day.total_focus_time_minutes)
    ));
    output.push_str(&format!(
        "  Distractions/h:   {:.1}\n",
        day.distractions_per_hour
    ));
}

/// Render a run of days as a table followed by the window totals.
pub fn render_window(days: &[DailyMetrics]) -> String {
    let mut output = String::new();

    output.push_str(&format!("\nLast {} Days\n", days.len()));
    output.push_str(&format!(
        "{:<12}{:>9}{:>7}{:>11}{:>14}{:>10}{:>8}\n",
        "date", "sessions", "clean", "abandoned", "distractions", "focus", "per h"
    ));
    for day in days {
        output.push_str(&format!(
            "{:<12}{:>9}{:>7}{:>11}{:>14}{:>10}{:>8.1}\n",
            day.date.format("%Y-%m-%d").to_string(),
            day.total_sessions,
            day.clean_sessions,
            day.abandoned_sessions,
            day.total_distractions,
            format_minutes(day.total_focus_time_minutes),
            day.distractions_per_hour,
        ));
    }

    let totals = DailyMetricsAnalyzer::window_totals(days);
    output.push_str(&"-".repeat(71));
    output.push('\n');
    output.push_str(&format!(
        "Total: {} sessions ({} clean, {} abandoned), {} focused\n",
        totals.total_sessions,
        totals.clean_sessions,
        totals.abandoned_sessions,
        format_minutes(totals.total_focus_time_minutes),
    ));

    output
}

/// `"1h 5m"`, or `"25m"` under an hour.
pub fn format_minutes(minutes: f64) -> String {
    let minutes = minutes.max(0.0);
    let hours = (minutes / 60.0).floor();
    let mins = (minutes - hours * 60.0).round();
    if hours > 0.0 {
        format!("{hours:.0}h {mins:.0}m")
    } else {
        format!("{mins:.0}m")
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
