use chrono::Local;
use pomofocus_core::stats::format_minutes;
use pomofocus_core::storage::Database;
use pomofocus_core::Result;

pub fn run(limit: usize, json: bool) -> Result<()> {
    let db = Database::open()?;
    let sessions = db.recent_sessions(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!(
        "{:<18}{:<11}{:>8}{:>14}",
        "started", "status", "focus", "distractions"
    );
    for session in &sessions {
        println!(
            "{:<18}{:<11}{:>8}{:>14}",
            session
                .start_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            session.status,
            format_minutes(session.focus_minutes()),
            session.distraction_count,
        );
    }
    Ok(())
}
