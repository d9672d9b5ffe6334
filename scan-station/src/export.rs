//! CSV export of one day's events
//!
//! The column set and escaping match the files the reporting side already
//! ingests: every field is a JSON literal, so strings carry quotes and
//! embedded commas or quotes never break the row. `details` and `synced`
//! stay out of the file.

use std::path::{Path, PathBuf};

use shared::ScanEvent;

use crate::store::EventStore;
use crate::utils::AppResult;

const CSV_HEADER: &str = "uuid,timestamp,operator,client,city,box,code,type,source";

/// Write `scanner_log_{day}.csv` into `dir` and return its path
///
/// Rows are chronological. An empty day still produces a file with just the
/// header row.
pub fn export_day(events: &EventStore, dir: &Path, day: &str) -> AppResult<PathBuf> {
    let mut rows = events.list_by_day(day)?;
    rows.sort_by_key(|event| (event.timestamp, event.uuid.clone()));

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for event in &rows {
        lines.push(csv_row(event)?);
    }

    let path = dir.join(format!("scanner_log_{day}.csv"));
    std::fs::write(&path, lines.join("\n"))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Exported day to CSV");
    Ok(path)
}

fn csv_row(event: &ScanEvent) -> AppResult<String> {
    let fields = [
        serde_json::to_string(&event.uuid)?,
        serde_json::to_string(&event.timestamp)?,
        serde_json::to_string(&event.operator)?,
        serde_json::to_string(&event.client)?,
        serde_json::to_string(&event.city)?,
        serde_json::to_string(&event.box_id)?,
        serde_json::to_string(&event.code)?,
        serde_json::to_string(&event.kind)?,
        serde_json::to_string(&event.source)?,
    ];
    Ok(fields.join(","))
}
