//! Pending-candidate discovery.

use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::JudgeError;

/// One generated candidate that has not been scored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeTask {
    /// Document the candidate lives in and the evaluation is written to.
    pub path: PathBuf,
    pub query: String,
    /// The candidate object from `final_result`.
    pub candidate: Value,
    /// The document's `evaluate_standard` rubric (an empty object if absent).
    pub rubric: Value,
    /// Position of the candidate in `final_result`.
    pub candidate_index: usize,
}

impl JudgeTask {
    /// The candidate's generated text. Older documents spell the key
    /// `responese`.
    pub fn candidate_text(&self) -> &str {
        self.candidate
            .get("response")
            .or_else(|| self.candidate.get("responese"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Key of this candidate's entry in the result field.
    pub fn result_key(&self) -> String {
        self.candidate_index.to_string()
    }
}

/// List every unscored candidate in the top-level `*.json` documents of
/// `folder`, ordered by file name.
///
/// Documents that cannot be read or lack `query`/`final_result` are skipped.
pub async fn discover_pending(
    folder: &Path,
    result_field: &str,
) -> Result<Vec<JudgeTask>, JudgeError> {
    let is_dir = tokio::fs::metadata(folder)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(JudgeError::FolderNotFound(folder.display().to_string()));
    }

    let root = folder.to_path_buf();
    let paths = tokio::task::spawn_blocking(move || list_documents(&root))
        .await
        .map_err(|e| JudgeError::Walk(e.to_string()))??;

    let mut tasks = Vec::new();
    for path in paths {
        match pending_in_document(&path, result_field).await {
            Ok(found) => tasks.extend(found),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document");
            }
        }
    }

    tracing::info!(
        folder = %folder.display(),
        pending = tasks.len(),
        "Discovered pending candidates"
    );
    Ok(tasks)
}

/// Sorted top-level `*.json` files under `folder`.
fn list_documents(folder: &Path) -> Result<Vec<PathBuf>, JudgeError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| JudgeError::Walk(e.to_string()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

async fn pending_in_document(
    path: &Path,
    result_field: &str,
) -> Result<Vec<JudgeTask>, JudgeError> {
    let content = tokio::fs::read_to_string(path).await?;
    let document: Value = serde_json::from_str(&content)?;

    let (Some(query), Some(candidates)) = (
        document.get("query").and_then(Value::as_str),
        document.get("final_result").and_then(Value::as_array),
    ) else {
        return Ok(Vec::new());
    };

    let scored = document.get(result_field).and_then(Value::as_object);
    let rubric = document
        .get("evaluate_standard")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Ok(candidates
        .iter()
        .enumerate()
        .filter(|(idx, _)| !scored.is_some_and(|s| s.contains_key(&idx.to_string())))
        .map(|(idx, candidate)| JudgeTask {
            path: path.to_path_buf(),
            query: query.to_string(),
            candidate: candidate.clone(),
            rubric: rubric.clone(),
            candidate_index: idx,
        })
        .collect())
}
