//! Statistics module for pomofocus
//!
//! Derives per-day focus metrics from stored sessions: counts by outcome,
//! distraction totals and rates, focus time, and a trailing window of days.

mod daily;

pub use daily::{
    format_minutes, render_day, render_window, DailyMetrics, DailyMetricsAnalyzer, MetricsReport,
    WindowTotals, DEFAULT_WINDOW_DAYS,
};
