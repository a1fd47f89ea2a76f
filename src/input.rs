//! JSONL work-item loading.
//!
//! Each non-blank line is a JSON object with a `query` and an optional
//! `index`. Other fields are ignored. Lines that cannot become a work item
//! are collected as rejections instead of aborting the load.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::InputError;
use crate::pipeline::WorkItem;

/// Items accepted from an input file plus the lines that were rejected.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub items: Vec<WorkItem>,
    pub rejected: Vec<InputError>,
}

impl LoadedBatch {
    /// Drop items whose index is in `done`, returning how many were skipped.
    pub fn skip_indices(&mut self, done: &HashSet<u64>) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !done.contains(&item.index));
        before - self.items.len()
    }
}

/// Read work items from the JSONL file at `path`.
///
/// Fails only if the file cannot be read.
pub async fn load_work_items(path: &Path) -> Result<LoadedBatch, InputError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(InputError::NotFound(path.display().to_string()));
    }
    let content = tokio::fs::read_to_string(path).await?;
    let batch = parse_work_items(&content);

    for rejection in &batch.rejected {
        tracing::warn!(path = %path.display(), error = %rejection, "Rejected input record");
    }
    tracing::info!(
        path = %path.display(),
        items = batch.items.len(),
        rejected = batch.rejected.len(),
        "Loaded work items"
    );

    Ok(batch)
}

/// Parse JSONL content. A missing `index` falls back to the 0-based line
/// number; reported line numbers are 1-based.
pub fn parse_work_items(content: &str) -> LoadedBatch {
    let mut batch = LoadedBatch::default();
    let mut first_seen: HashMap<u64, usize> = HashMap::new();

    for (offset, raw) in content.lines().enumerate() {
        let line = offset + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed, offset as u64, line) {
            Ok(item) => {
                if let Some(&first_line) = first_seen.get(&item.index) {
                    batch.rejected.push(InputError::DuplicateIndex {
                        line,
                        index: item.index,
                        first_line,
                    });
                    continue;
                }
                first_seen.insert(item.index, line);
                batch.items.push(item);
            }
            Err(err) => batch.rejected.push(err),
        }
    }

    batch
}

fn parse_line(text: &str, fallback_index: u64, line: usize) -> Result<WorkItem, InputError> {
    let value: Value = serde_json::from_str(text).map_err(|e| InputError::MalformedLine {
        line,
        message: e.to_string(),
    })?;

    let object = value.as_object().ok_or_else(|| InputError::MalformedLine {
        line,
        message: "expected a JSON object".to_string(),
    })?;

    let index = match object.get("index") {
        None | Some(Value::Null) => fallback_index,
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| InputError::MalformedLine {
            line,
            message: format!("index {} is not a non-negative integer", n),
        })?,
        Some(Value::String(s)) => s.trim().parse().map_err(|_| InputError::MalformedLine {
            line,
            message: format!("index {:?} is not a non-negative integer", s),
        })?,
        Some(other) => {
            return Err(InputError::MalformedLine {
                line,
                message: format!("unsupported index value {}", other),
            })
        }
    };

    let query = object
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(InputError::MissingQuery { line })?;

    Ok(WorkItem::new(index, query))
}
