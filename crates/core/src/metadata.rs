//! Single-pass extraction of the cheap, always-persisted session fields
//! (summary, line count), plus a separate, more expensive pass for session
//! duration that callers opt into lazily, and the subagent-detection
//! helpers the indexer uses when classifying discovered files.

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

/// Cheap metadata pulled from a session file in one sequential read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    pub summary: Option<String>,
    pub line_count: u64,
}

/// Scan every line of `path` once, extracting the fields cheap enough to
/// recompute on every index refresh: the latest `"type": "summary"` record's
/// `summary` field, and the line count.
///
/// Only lines whose raw bytes contain the literal substring `"type":"summary"`
/// or `"type": "summary"` are JSON-parsed — a performance contract, not a
/// correctness one: any line that doesn't match either spelling is skipped
/// without ever touching a JSON parser.
pub fn extract(path: &Path) -> std::io::Result<SessionMetadata> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut meta = SessionMetadata::default();

    for line in reader.lines() {
        let line = line?;
        meta.line_count += 1;

        if !(line.contains(r#""type":"summary""#) || line.contains(r#""type": "summary""#)) {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) == Some("summary") {
            if let Some(summary) = value.get("summary").and_then(Value::as_str) {
                meta.summary = Some(summary.to_string());
            }
        }
    }

    Ok(meta)
}

/// Whether `file_path` is itself a subagent transcript: any path component
/// equal to the literal `subagents`. This is a pure path check, not a
/// content scan — subagent files live at
/// `<project>/<parent_session_id>/subagents/<agent_id>.jsonl`.
pub fn is_subagent_session(file_path: &Path) -> bool {
    file_path.components().any(|c| c.as_os_str() == "subagents")
}

/// Whether a main session at `<dir>/<file>.ext` has a subagents directory
/// alongside it, at `<dir>/<file>/subagents`.
pub fn has_subagents_dir(file_path: &Path) -> bool {
    let Some(stem) = file_path.file_stem() else {
        return false;
    };
    let Some(dir) = file_path.parent() else {
        return false;
    };
    dir.join(stem).join("subagents").is_dir()
}

/// Compute a session's total duration by summing the `duration` field of
/// every `"type": "turn_duration"` record. `None` if the sum is zero (no
/// such records, or all durations recorded as zero) or if the file can't be
/// read. Computed separately from [`extract`] since it requires a second
/// full-file scan that most callers never need.
pub fn duration_ms(path: &Path) -> std::io::Result<Option<i64>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut total: i64 = 0;
    for line in reader.lines() {
        let line = line?;
        if !line.contains(r#""turn_duration""#) {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) == Some("turn_duration") {
            if let Some(duration) = value.get("duration").and_then(Value::as_i64) {
                total += duration;
            }
        }
    }

    Ok(if total > 0 { Some(total) } else { None })
}
