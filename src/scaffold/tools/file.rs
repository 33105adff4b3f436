//! File manipulation tools for reading, writing, and editing files.
//!
//! This module provides three file-related tools:
//! - `ReadFileTool`: Read file contents with optional line range
//! - `WriteFileTool`: Create or overwrite files
//! - `EditFileTool`: Find and replace content in existing files
//!
//! Relative paths resolve against the working directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ExecutionContext, Tool, ToolError, ToolOutcome};

/// Maximum file size that can be read (1MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Stand-in for file contents in the transcript.
const REDACTED: &str = "[Content hidden]";

/// Validate a file path for safety.
fn validate_path(path: &str) -> Result<(), ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::InvalidParameters(
            "Path cannot be empty".to_string(),
        ));
    }

    if path.contains('\0') {
        return Err(ToolError::InvalidParameters(
            "Path contains invalid null character".to_string(),
        ));
    }

    Ok(())
}

/// Resolve `path` against the working directory unless it is absolute.
pub fn resolve_path(working_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        working_dir.join(candidate)
    }
}

/// Replace the named string fields of `args` with a placeholder.
fn redact_fields(args: &Value, fields: &[&str]) -> Value {
    let mut redacted = args.clone();
    if let Some(object) = redacted.as_object_mut() {
        for field in fields {
            if let Some(value) = object.get_mut(*field) {
                *value = Value::String(REDACTED.to_string());
            }
        }
    }
    redacted
}

// ============================================================================
// ReadFileTool
// ============================================================================

/// Parameters for the read_file tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReadFileParams {
    /// Path to the file to read.
    path: String,
    /// Optional starting line number (1-indexed).
    #[serde(default)]
    start_line: Option<usize>,
    /// Optional ending line number (1-indexed, inclusive).
    #[serde(default)]
    end_line: Option<usize>,
}

/// Tool for reading file contents. Never creates the file.
#[derive(Debug, Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally specify a range of lines to read."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the repository root or absolute"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Starting line number (1-indexed, optional)",
                    "minimum": 1
                },
                "end_line": {
                    "type": "integer",
                    "description": "Ending line number (1-indexed, inclusive, optional)",
                    "minimum": 1
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutcome, ToolError> {
        let params: ReadFileParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        validate_path(&params.path)?;

        if let (Some(start), Some(end)) = (params.start_line, params.end_line) {
            if start > end {
                return Err(ToolError::InvalidParameters(format!(
                    "start_line ({}) cannot be greater than end_line ({})",
                    start, end
                )));
            }
        }

        let full_path = resolve_path(&ctx.working_dir, &params.path);

        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ToolOutcome::error(format!("File not found: {}", params.path)));
            }
            Err(e) => {
                return Ok(ToolOutcome::error(format!("Failed to read file: {}", e)));
            }
        };

        if metadata.is_dir() {
            return Ok(ToolOutcome::error(format!(
                "{} is a directory, not a file",
                params.path
            )));
        }

        if metadata.len() > MAX_FILE_SIZE {
            return Ok(ToolOutcome::error(format!(
                "File size ({} bytes) exceeds maximum allowed ({} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let bytes = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ToolOutcome::error(format!("Failed to read file: {}", e))),
        };
        let content = String::from_utf8_lossy(&bytes);

        if params.start_line.is_none() && params.end_line.is_none() {
            return Ok(ToolOutcome::success(content.into_owned()));
        }

        let start = params.start_line.unwrap_or(1).max(1);
        let end = params.end_line.unwrap_or(usize::MAX);
        let selected: Vec<&str> = content
            .lines()
            .skip(start - 1)
            .take(end.saturating_sub(start) + 1)
            .collect();
        Ok(ToolOutcome::success(selected.join("\n")))
    }
}

// ============================================================================
// WriteFileTool
// ============================================================================

/// Parameters for the write_file tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WriteFileParams {
    /// Path to the file to write.
    path: String,
    /// Content to write to the file.
    content: String,
}

/// Tool for creating or overwriting files.
#[derive(Debug, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file with the specified content. Creates parent directories if they don't exist."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full new content of the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn redacted_args(&self, args: &Value) -> Value {
        redact_fields(args, &["content"])
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutcome, ToolError> {
        let params: WriteFileParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        validate_path(&params.path)?;

        let full_path = resolve_path(&ctx.working_dir, &params.path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::FilesystemError(format!(
                    "Failed to create directories for {}: {}",
                    params.path, e
                ))
            })?;
        }

        tokio::fs::write(&full_path, params.content.as_bytes())
            .await
            .map_err(|e| {
                ToolError::FilesystemError(format!("Failed to write {}: {}", params.path, e))
            })?;

        Ok(ToolOutcome::success(format!(
            "Successfully wrote {} bytes to {}",
            params.content.len(),
            params.path
        )))
    }
}

// ============================================================================
// EditFileTool
// ============================================================================

/// Parameters for the edit_file tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EditFileParams {
    /// Path to the file to edit.
    path: String,
    /// Content to find and replace.
    old_content: String,
    /// New content to replace with.
    new_content: String,
    /// Replace every occurrence instead of the first.
    #[serde(default)]
    replace_all: bool,
}

/// Tool for editing existing files by literal find-and-replace.
#[derive(Debug, Default)]
pub struct EditFileTool;

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit an existing file by replacing literal content. old_content must match exactly (including whitespace). Replaces the first occurrence unless replace_all is true."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "old_content": {
                    "type": "string",
                    "description": "Exact content to find"
                },
                "new_content": {
                    "type": "string",
                    "description": "Replacement content"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                }
            },
            "required": ["path", "old_content", "new_content"]
        })
    }

    fn redacted_args(&self, args: &Value) -> Value {
        redact_fields(args, &["old_content", "new_content"])
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutcome, ToolError> {
        let params: EditFileParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        validate_path(&params.path)?;

        if params.old_content.is_empty() {
            return Err(ToolError::InvalidParameters(
                "old_content cannot be empty".to_string(),
            ));
        }

        let full_path = resolve_path(&ctx.working_dir, &params.path);

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ToolOutcome::error(format!("File not found: {}", params.path)));
            }
            Err(e) => return Ok(ToolOutcome::error(format!("Failed to read file: {}", e))),
        };

        let occurrences = content.matches(&params.old_content).count();
        if occurrences == 0 {
            return Ok(ToolOutcome::error(format!(
                "Edit target not found in {}. Make sure old_content matches exactly (including whitespace).",
                params.path
            )));
        }

        let (updated, replaced) = if params.replace_all {
            (
                content.replace(&params.old_content, &params.new_content),
                occurrences,
            )
        } else {
            (
                content.replacen(&params.old_content, &params.new_content, 1),
                1,
            )
        };

        tokio::fs::write(&full_path, updated.as_bytes())
            .await
            .map_err(|e| {
                ToolError::FilesystemError(format!("Failed to write {}: {}", params.path, e))
            })?;

        Ok(ToolOutcome::success(format!(
            "Successfully edited {} ({} replacement{})",
            params.path,
            replaced,
            if replaced == 1 { "" } else { "s" }
        )))
    }
}
