//! File-mutating and file-reading tools, constrained to a workspace root:
//! `create_file`, `update_file`, `delete_file`, `move_file`, `apply_patch`,
//! `read_files`, `scan_workspace`.
//!
//! Every path argument is resolved through [`validate_path`] before touch;
//! anything that would escape the workspace root fails with
//! `Error::ToolPathEscape` rather than reaching the filesystem.

use std::path::{Component, Path, PathBuf};

use ae_domain::action::{content_hash, FileChange, WriteResult};
use ae_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Reads above this size are truncated.
pub const READ_CAP_BYTES: usize = 200 * 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Path validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve `requested` under `workspace_root`, rejecting absolute paths,
/// raw `..` components, and anything that canonicalizes outside the root.
pub fn validate_path(workspace_root: &Path, requested: &str) -> Result<PathBuf> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(Error::ToolPathEscape(format!(
            "absolute paths are not allowed (got '{requested}')"
        )));
    }

    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::ToolPathEscape(format!(
                "path must not contain '..' components (got '{requested}')"
            )));
        }
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| Error::ToolIo(format!("cannot resolve workspace root '{}': {e}", workspace_root.display())))?;

    let candidate = canonical_root.join(requested_path);

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| Error::ToolIo(format!("cannot resolve path '{}': {e}", candidate.display())))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| Error::ToolIo(format!("cannot resolve ancestor of '{}': {e}", candidate.display())))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(Error::ToolPathEscape(format!(
            "path '{requested}' resolves outside workspace root '{}'",
            canonical_root.display()
        )));
    }

    Ok(resolved)
}

async fn read_existing(path: &Path) -> Option<String> {
    fs::read_to_string(path).await.ok()
}

/// Write `content` to `path` atomically: write to a `.tmp` sibling, flush,
/// sync, then rename into place.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::ToolIo(format!("failed to create parent directory: {e}")))?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|e| Error::ToolIo(format!("failed to create temp file '{}': {e}", tmp_path.display())))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| Error::ToolIo(format!("failed to write temp file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| Error::ToolIo(format!("failed to flush temp file: {e}")))?;
    file.sync_data()
        .await
        .map_err(|e| Error::ToolIo(format!("failed to sync temp file: {e}")))?;

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let tmp = tmp_path.clone();
        tokio::spawn(async move {
            let _ = fs::remove_file(&tmp).await;
        });
        return Err(Error::ToolIo(format!("failed to rename temp file into place: {e}")));
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_file / update_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write `content` to `path`, creating it (and parent directories) if
/// needed. `create_file` and `update_file` share this implementation; the
/// planner's chosen title is the only thing that distinguishes them.
pub async fn write_file(workspace_root: &Path, path: &str, content: &str) -> FileChange {
    let resolved = match validate_path(workspace_root, path) {
        Ok(p) => p,
        Err(e) => return failed_change(path.to_string(), None, e),
    };

    let before_content = read_existing(&resolved).await;
    let before_hash = before_content.as_deref().map(|c| content_hash(c.as_bytes()));

    match write_atomic(&resolved, content).await {
        Ok(()) => FileChange {
            file_path: path.to_string(),
            before_content,
            after_content: Some(content.to_string()),
            file_content: content.to_string(),
            diff_unified: None,
            before_hash,
            after_hash: Some(content_hash(content.as_bytes())),
            write_result: WriteResult::Written,
            error: None,
        },
        Err(e) => failed_change(path.to_string(), before_content, e),
    }
}

fn failed_change(file_path: String, before_content: Option<String>, e: Error) -> FileChange {
    FileChange {
        file_path,
        before_content,
        after_content: None,
        file_content: String::new(),
        diff_unified: None,
        before_hash: None,
        after_hash: None,
        write_result: WriteResult::Failed,
        error: Some(e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// delete_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_file(workspace_root: &Path, path: &str) -> FileChange {
    let resolved = match validate_path(workspace_root, path) {
        Ok(p) => p,
        Err(e) => return failed_change(path.to_string(), None, e),
    };

    let before_content = read_existing(&resolved).await;
    if before_content.is_none() && !resolved.exists() {
        return FileChange {
            file_path: path.to_string(),
            before_content: None,
            after_content: None,
            file_content: String::new(),
            diff_unified: None,
            before_hash: None,
            after_hash: None,
            write_result: WriteResult::Skipped,
            error: Some("file does not exist".into()),
        };
    }
    let before_hash = before_content.as_deref().map(|c| content_hash(c.as_bytes()));

    let removed = if resolved.is_dir() {
        fs::remove_dir(&resolved).await
    } else {
        fs::remove_file(&resolved).await
    };

    match removed {
        Ok(()) => FileChange {
            file_path: path.to_string(),
            before_content,
            after_content: None,
            file_content: String::new(),
            diff_unified: None,
            before_hash,
            after_hash: None,
            write_result: WriteResult::Written,
            error: None,
        },
        Err(e) => failed_change(path.to_string(), before_content, Error::ToolIo(e.to_string())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// move_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn move_file(workspace_root: &Path, from: &str, to: &str) -> FileChange {
    let source = match validate_path(workspace_root, from) {
        Ok(p) => p,
        Err(e) => return failed_change(to.to_string(), None, e),
    };
    let destination = match validate_path(workspace_root, to) {
        Ok(p) => p,
        Err(e) => return failed_change(to.to_string(), None, e),
    };

    let before_content = read_existing(&source).await;
    if !source.exists() {
        return failed_change(to.to_string(), None, Error::ToolInvalidInput(format!("source '{from}' does not exist")));
    }

    if let Some(parent) = destination.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            return failed_change(to.to_string(), before_content, Error::ToolIo(e.to_string()));
        }
    }

    match fs::rename(&source, &destination).await {
        Ok(()) => {
            let hash = before_content.as_deref().map(|c| content_hash(c.as_bytes()));
            FileChange {
                file_path: to.to_string(),
                before_content: before_content.clone(),
                after_content: before_content.clone(),
                file_content: before_content.unwrap_or_default(),
                diff_unified: None,
                before_hash: hash.clone(),
                after_hash: hash,
                write_result: WriteResult::Written,
                error: None,
            }
        }
        Err(e) => failed_change(to.to_string(), before_content, Error::ToolIo(e.to_string())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// apply_patch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn apply_patch(workspace_root: &Path, path: &str, diff_unified: &str) -> FileChange {
    let resolved = match validate_path(workspace_root, path) {
        Ok(p) => p,
        Err(e) => return failed_change(path.to_string(), None, e),
    };

    let before_content = match read_existing(&resolved).await {
        Some(c) => c,
        None => return failed_change(path.to_string(), None, Error::ToolInvalidInput(format!("'{path}' does not exist"))),
    };

    let after_content = match apply_unified_diff(&before_content, diff_unified) {
        Ok(c) => c,
        Err(e) => return failed_change(path.to_string(), Some(before_content), e),
    };

    match write_atomic(&resolved, &after_content).await {
        Ok(()) => FileChange {
            file_path: path.to_string(),
            before_hash: Some(content_hash(before_content.as_bytes())),
            after_hash: Some(content_hash(after_content.as_bytes())),
            before_content: Some(before_content),
            after_content: Some(after_content.clone()),
            file_content: after_content,
            diff_unified: Some(diff_unified.to_string()),
            write_result: WriteResult::Written,
            error: None,
        },
        Err(e) => failed_change(path.to_string(), Some(before_content), e),
    }
}

/// Apply a minimal unified diff (one or more `@@ -l,c +l,c @@` hunks) to
/// `original`. Hunk line numbers are trusted; context/removed lines are
/// not verified against `original` beyond matching line count.
fn apply_unified_diff(original: &str, diff: &str) -> Result<String> {
    let original_lines: Vec<&str> = original.split('\n').collect();
    let mut out: Vec<String> = Vec::new();
    let mut cursor: usize = 0; // 0-indexed position in original_lines already copied

    let mut lines = diff.lines().peekable();
    let mut saw_hunk = false;

    while let Some(line) = lines.next() {
        if !line.starts_with("@@") {
            continue;
        }
        saw_hunk = true;
        let (old_start, _old_count) = parse_hunk_header(line)?;
        // old_start is 1-indexed; copy untouched lines up to the hunk start.
        let hunk_start = old_start.saturating_sub(1);
        if hunk_start < cursor {
            return Err(Error::ToolInvalidInput("overlapping or out-of-order hunks".into()));
        }
        for l in &original_lines[cursor..hunk_start.min(original_lines.len())] {
            out.push((*l).to_string());
        }
        cursor = hunk_start;

        while let Some(&body_line) = lines.peek() {
            if body_line.starts_with("@@") {
                break;
            }
            let body_line = lines.next().unwrap();
            if let Some(rest) = body_line.strip_prefix('+') {
                out.push(rest.to_string());
            } else if let Some(_rest) = body_line.strip_prefix('-') {
                cursor += 1;
            } else {
                let rest = body_line.strip_prefix(' ').unwrap_or(body_line);
                out.push(rest.to_string());
                cursor += 1;
            }
        }
    }

    if !saw_hunk {
        return Err(Error::ToolInvalidInput("diff contains no hunks".into()));
    }

    for l in &original_lines[cursor.min(original_lines.len())..] {
        out.push((*l).to_string());
    }

    Ok(out.join("\n"))
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize)> {
    // "@@ -12,5 +12,7 @@" -> old range is "12,5"
    let body = line.trim_start_matches("@@").trim();
    let old_part = body
        .split_whitespace()
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .ok_or_else(|| Error::ToolInvalidInput(format!("malformed hunk header: '{line}'")))?;
    let mut parts = old_part.splitn(2, ',');
    let start: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::ToolInvalidInput(format!("malformed hunk header: '{line}'")))?;
    let count: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    Ok((start, count))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// read_files
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct ReadFileResult {
    pub path: String,
    pub chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub content_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read each of `paths`, capping content at [`READ_CAP_BYTES`]. A single
/// unreadable path does not fail the whole batch — it is reported inline.
pub async fn read_files(workspace_root: &Path, paths: &[String]) -> Vec<ReadFileResult> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let result = match validate_path(workspace_root, path) {
            Ok(resolved) => match fs::read_to_string(&resolved).await {
                Ok(content) => {
                    let chars = content.chars().count();
                    let (content, truncated) = cap_content(content);
                    ReadFileResult {
                        path: path.clone(),
                        chars,
                        content: Some(content),
                        content_truncated: truncated,
                        error: None,
                    }
                }
                Err(e) => ReadFileResult {
                    path: path.clone(),
                    chars: 0,
                    content: None,
                    content_truncated: false,
                    error: Some(e.to_string()),
                },
            },
            Err(e) => ReadFileResult {
                path: path.clone(),
                chars: 0,
                content: None,
                content_truncated: false,
                error: Some(e.to_string()),
            },
        };
        out.push(result);
    }
    out
}

fn cap_content(content: String) -> (String, bool) {
    if content.len() <= READ_CAP_BYTES {
        return (content, false);
    }
    let mut boundary = READ_CAP_BYTES;
    while boundary > 0 && !content.is_char_boundary(boundary) {
        boundary -= 1;
    }
    (content[..boundary].to_string(), true)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// scan_workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanWorkspaceRequest {
    pub root: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_files: usize,
}

impl Default for ScanWorkspaceRequest {
    fn default() -> Self {
        Self {
            root: ".".into(),
            include: Vec::new(),
            exclude: default_excludes(),
            max_files: 2_000,
        }
    }
}

fn default_excludes() -> Vec<String> {
    vec![".git".into(), "target".into(), "node_modules".into()]
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedFile {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Recursively list workspace files under `req.root`, honoring `exclude`
/// directory names and an `include` suffix allowlist (when non-empty),
/// stopping at `max_files`.
pub async fn scan_workspace(workspace_root: &Path, req: &ScanWorkspaceRequest) -> Result<Vec<ScannedFile>> {
    let start = validate_path(workspace_root, &req.root)?;
    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| Error::ToolIo(format!("cannot resolve workspace root: {e}")))?;

    let mut out = Vec::new();
    let mut stack = vec![start];

    while let Some(dir) = stack.pop() {
        if out.len() >= req.max_files {
            break;
        }
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| Error::ToolIo(e.to_string()))? {
            if out.len() >= req.max_files {
                break;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if req.exclude.iter().any(|x| x == &name) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| Error::ToolIo(e.to_string()))?;
            let entry_path = entry.path();
            let rel = entry_path
                .strip_prefix(&canonical_root)
                .unwrap_or(&entry_path)
                .to_string_lossy()
                .replace('\\', "/");

            if metadata.is_dir() {
                out.push(ScannedFile { path: rel, size: 0, is_dir: true });
                stack.push(entry_path);
            } else {
                if !req.include.is_empty() && !req.include.iter().any(|suffix| rel.ends_with(suffix.as_str())) {
                    continue;
                }
                out.push(ScannedFile { path: rel, size: metadata.len(), is_dir: false });
            }
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_workspace() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn validate_path_rejects_parent_traversal() {
        let ws = tmp_workspace();
        let result = validate_path(ws.path(), "../etc/passwd");
        assert!(matches!(result, Err(Error::ToolPathEscape(_))));
    }

    #[test]
    fn validate_path_rejects_absolute_path() {
        let ws = tmp_workspace();
        let abs_path = if cfg!(windows) { "C:\\Windows\\System32" } else { "/etc/passwd" };
        let result = validate_path(ws.path(), abs_path);
        assert!(matches!(result, Err(Error::ToolPathEscape(_))));
    }

    #[test]
    fn validate_path_accepts_nested_new_file() {
        let ws = tmp_workspace();
        std::fs::create_dir_all(ws.path().join("subdir")).unwrap();
        let result = validate_path(ws.path(), "subdir/new_file.txt");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn write_file_then_read_files_roundtrip() {
        let ws = tmp_workspace();
        let change = write_file(ws.path(), "hello.txt", "hi there").await;
        assert_eq!(change.write_result, WriteResult::Written);
        assert!(change.before_content.is_none());
        assert_eq!(change.after_content.as_deref(), Some("hi there"));

        let results = read_files(ws.path(), &["hello.txt".to_string()]).await;
        assert_eq!(results[0].content.as_deref(), Some("hi there"));
        assert!(!results[0].content_truncated);
    }

    #[tokio::test]
    async fn write_file_records_before_content_on_overwrite() {
        let ws = tmp_workspace();
        write_file(ws.path(), "a.txt", "v1").await;
        let change = write_file(ws.path(), "a.txt", "v2").await;
        assert_eq!(change.before_content.as_deref(), Some("v1"));
        assert_eq!(change.after_content.as_deref(), Some("v2"));
        assert_ne!(change.before_hash, change.after_hash);
    }

    #[tokio::test]
    async fn delete_file_reports_skipped_when_missing() {
        let ws = tmp_workspace();
        let change = delete_file(ws.path(), "missing.txt").await;
        assert_eq!(change.write_result, WriteResult::Skipped);
    }

    #[tokio::test]
    async fn move_file_renames_and_preserves_content() {
        let ws = tmp_workspace();
        write_file(ws.path(), "old.txt", "payload").await;
        let change = move_file(ws.path(), "old.txt", "new.txt").await;
        assert_eq!(change.write_result, WriteResult::Written);
        assert!(!ws.path().join("old.txt").exists());
        assert!(ws.path().join("new.txt").exists());
        assert_eq!(change.file_content, "payload");
    }

    #[tokio::test]
    async fn apply_patch_inserts_and_removes_lines() {
        let ws = tmp_workspace();
        write_file(ws.path(), "f.txt", "one\ntwo\nthree\n").await;
        let diff = "@@ -2,1 +2,2 @@\n-two\n+TWO\n+also new\n";
        let change = apply_patch(ws.path(), "f.txt", diff).await;
        assert_eq!(change.write_result, WriteResult::Written, "{:?}", change.error);
        assert_eq!(change.after_content.as_deref(), Some("one\nTWO\nalso new\nthree\n"));
    }

    #[tokio::test]
    async fn apply_patch_fails_on_missing_file() {
        let ws = tmp_workspace();
        let change = apply_patch(ws.path(), "nope.txt", "@@ -1,1 +1,1 @@\n-x\n+y\n").await;
        assert_eq!(change.write_result, WriteResult::Failed);
    }

    #[tokio::test]
    async fn scan_workspace_excludes_git_and_respects_cap() {
        let ws = tmp_workspace();
        std::fs::create_dir_all(ws.path().join(".git")).unwrap();
        std::fs::write(ws.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(ws.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::write(ws.path().join("b.md"), "# hi").unwrap();

        let req = ScanWorkspaceRequest::default();
        let files = scan_workspace(ws.path(), &req).await.unwrap();
        assert!(files.iter().all(|f| !f.path.starts_with(".git")));
        assert!(files.iter().any(|f| f.path == "a.rs"));
    }

    #[tokio::test]
    async fn scan_workspace_include_filters_by_suffix() {
        let ws = tmp_workspace();
        std::fs::write(ws.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::write(ws.path().join("b.md"), "# hi").unwrap();

        let req = ScanWorkspaceRequest { include: vec![".rs".into()], ..ScanWorkspaceRequest::default() };
        let files = scan_workspace(ws.path(), &req).await.unwrap();
        assert!(files.iter().filter(|f| !f.is_dir).all(|f| f.path.ends_with(".rs")));
    }
}
