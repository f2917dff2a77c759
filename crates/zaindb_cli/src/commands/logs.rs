//! Log commands.

use super::{print_json, Format};
use zaindb_board::{AppContext, LogEntry};

/// Lists every log entry, including those still being written.
pub async fn list(app: &AppContext, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    app.logs().settled().await;
    let entries = app.logs().fetch_all().await?;
    match format {
        Format::Json => print_json(&entries)?,
        Format::Text => {
            if entries.is_empty() {
                println!("No log entries");
            }
            for entry in &entries {
                println!("{}", line(entry));
            }
        }
    }
    Ok(())
}

/// Deletes log entry `id`.
pub async fn delete(app: &AppContext, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    match app.logs().try_remove(id).await? {
        0 => println!("No log entry with id {id}"),
        _ => println!("Deleted log entry {id}"),
    }
    Ok(())
}

/// Deletes every log entry.
pub async fn clear(app: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    app.logs().settled().await;
    app.logs().try_clear().await?;
    println!("Cleared all log entries");
    Ok(())
}

fn level_name(level: i64) -> &'static str {
    match level {
        i64::MIN..=0 => "DEBUG",
        1 => "INFO",
        2 => "WARN",
        _ => "ERROR",
    }
}

fn line(entry: &LogEntry) -> String {
    let id = entry.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "#{id:<4} {} {:<5} {}: {} (v{})",
        entry.time.as_deref().unwrap_or("-"),
        level_name(entry.level),
        entry.from,
        entry.msg,
        entry.version.as_deref().unwrap_or("?"),
    )
}
