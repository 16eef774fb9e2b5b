use chrono::Local;
use clap::Subcommand;
use pomofocus_core::stats::{render_day, render_window};
use pomofocus_core::storage::Database;
use pomofocus_core::{Config, DailyMetrics, DailyMetricsAnalyzer, Result, SessionSource};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Yesterday's stats
    Yesterday {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// One entry per day over the trailing window, oldest first
    Week {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Today, yesterday, the trailing window and every stored session
    Report {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: StatsAction) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open()?;
    let sessions = db.list_sessions()?;

    let analyzer = DailyMetricsAnalyzer::new(config.stats.window_days);
    let report = analyzer.build_report(&sessions, &Local::now());

    match action {
        StatsAction::Today { json } => print_day("Today", report.today.as_ref(), json)?,
        StatsAction::Yesterday { json } => {
            print_day("Yesterday", report.yesterday.as_ref(), json)?
        }
        StatsAction::Week { json } => {
            if json {
                let totals = DailyMetricsAnalyzer::window_totals(&report.window);
                let view = serde_json::json!({
                    "days": report.window,
                    "totals": totals,
                });
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render_window(&report.window));
            }
        }
        StatsAction::Report { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", analyzer.render_text(&report));
            }
        }
    }
    Ok(())
}

fn print_day(label: &str, day: Option<&DailyMetrics>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&day)?);
    } else {
        let mut output = String::new();
        render_day(&mut output, label, day);
        print!("{output}");
    }
    Ok(())
}
