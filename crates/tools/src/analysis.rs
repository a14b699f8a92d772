//! Read-only workspace analysis tools: `search_code`, `extract_symbols`,
//! `analyze_dependencies`. None of these mutate the workspace.

use std::path::Path;

use ae_domain::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::fs;

use crate::file_ops::{scan_workspace, validate_path, ScanWorkspaceRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// search_code
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct CodeMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Scan text files under `root` for literal occurrences of `query`,
/// stopping once `max_matches` lines are collected.
pub async fn search_code(workspace_root: &Path, query: &str, root: &str, max_matches: usize) -> Result<Vec<CodeMatch>> {
    if query.is_empty() {
        return Err(Error::ToolInvalidInput("query must not be empty".into()));
    }

    let files = scan_workspace(
        workspace_root,
        &ScanWorkspaceRequest { root: root.to_string(), max_files: 20_000, ..ScanWorkspaceRequest::default() },
    )
    .await?;

    let mut out = Vec::new();
    for file in files.iter().filter(|f| !f.is_dir) {
        if out.len() >= max_matches {
            break;
        }
        let resolved = validate_path(workspace_root, &file.path)?;
        let Ok(content) = fs::read_to_string(&resolved).await else {
            continue; // binary or unreadable; skip rather than fail the batch
        };
        for (idx, line) in content.lines().enumerate() {
            if out.len() >= max_matches {
                break;
            }
            if line.contains(query) {
                out.push(CodeMatch { path: file.path.clone(), line: idx + 1, text: line.trim().to_string() });
            }
        }
    }

    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// extract_symbols
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: String,
    pub line: usize,
}

struct SymbolPattern {
    regex: &'static Lazy<Regex>,
    kind: &'static str,
}

static RUST_FN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap());
static RUST_STRUCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap());
static RUST_ENUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)").unwrap());
static RUST_TRAIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)").unwrap());
static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap());
static JS_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").unwrap());
static PY_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*def\s+(\w+)").unwrap());
static PY_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*class\s+(\w+)").unwrap());

fn patterns_for(extension: &str) -> &'static [SymbolPattern] {
    static RUST: &[SymbolPattern] = &[
        SymbolPattern { regex: &RUST_FN, kind: "function" },
        SymbolPattern { regex: &RUST_STRUCT, kind: "struct" },
        SymbolPattern { regex: &RUST_ENUM, kind: "enum" },
        SymbolPattern { regex: &RUST_TRAIT, kind: "trait" },
    ];
    static JS: &[SymbolPattern] = &[
        SymbolPattern { regex: &JS_FUNCTION, kind: "function" },
        SymbolPattern { regex: &JS_CLASS, kind: "class" },
    ];
    static PY: &[SymbolPattern] =
        &[SymbolPattern { regex: &PY_DEF, kind: "function" }, SymbolPattern { regex: &PY_CLASS, kind: "class" }];

    match extension {
        "rs" => RUST,
        "js" | "jsx" | "ts" | "tsx" => JS,
        "py" => PY,
        _ => &[],
    }
}

/// Heuristic, regex-based symbol extraction. Good enough to orient a
/// planner; not a real parser and makes no claim to be one.
pub async fn extract_symbols(workspace_root: &Path, path: &str) -> Result<Vec<Symbol>> {
    let resolved = validate_path(workspace_root, path)?;
    let content = fs::read_to_string(&resolved)
        .await
        .map_err(|e| Error::ToolIo(format!("failed to read '{path}': {e}")))?;

    let extension = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
    let patterns = patterns_for(extension);

    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for pattern in patterns {
            if let Some(caps) = pattern.regex.captures(line) {
                out.push(Symbol { name: caps[1].to_string(), kind: pattern.kind.to_string(), line: idx + 1 });
                break;
            }
        }
    }
    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// analyze_dependencies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static CARGO_DEP_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^([A-Za-z0-9_-]+)\s*="#).unwrap());

/// Best-effort dependency listing for `Cargo.toml` and `package.json`;
/// any other manifest name returns an empty list rather than an error.
pub async fn analyze_dependencies(workspace_root: &Path, path: &str) -> Result<Vec<String>> {
    let resolved = validate_path(workspace_root, path)?;
    let content = fs::read_to_string(&resolved)
        .await
        .map_err(|e| Error::ToolIo(format!("failed to read '{path}': {e}")))?;

    let file_name = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or("");

    if file_name == "Cargo.toml" {
        Ok(parse_cargo_deps(&content))
    } else if file_name == "package.json" {
        Ok(parse_package_json_deps(&content)?)
    } else {
        Ok(Vec::new())
    }
}

fn parse_cargo_deps(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_deps_section = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_deps_section = trimmed.contains("dependencies");
            continue;
        }
        if in_deps_section {
            if let Some(caps) = CARGO_DEP_LINE.captures(trimmed) {
                out.push(caps[1].to_string());
            }
        }
    }
    out
}

fn parse_package_json_deps(content: &str) -> Result<Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| Error::ToolInvalidInput(format!("invalid package.json: {e}")))?;
    let mut out = Vec::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(obj) = value.get(key).and_then(|v| v.as_object()) {
            out.extend(obj.keys().cloned());
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn search_code_finds_matching_lines() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("a.rs"), "fn main() {\n    println!(\"needle\");\n}\n").unwrap();
        let matches = search_code(ws.path(), "needle", ".", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line, 2);
    }

    #[tokio::test]
    async fn search_code_rejects_empty_query() {
        let ws = TempDir::new().unwrap();
        let result = search_code(ws.path(), "", ".", 10).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn extract_symbols_finds_rust_items() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("lib.rs"), "pub struct Foo;\n\nfn bar() {}\n").unwrap();
        let symbols = extract_symbols(ws.path(), "lib.rs").await.unwrap();
        assert!(symbols.iter().any(|s| s.name == "Foo" && s.kind == "struct"));
        assert!(symbols.iter().any(|s| s.name == "bar" && s.kind == "function"));
    }

    #[tokio::test]
    async fn analyze_dependencies_parses_cargo_toml() {
        let ws = TempDir::new().unwrap();
        std::fs::write(
            ws.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\"\ntokio = { version = \"1\" }\n",
        )
        .unwrap();
        let deps = analyze_dependencies(ws.path(), "Cargo.toml").await.unwrap();
        assert!(deps.contains(&"serde".to_string()));
        assert!(deps.contains(&"tokio".to_string()));
    }

    #[tokio::test]
    async fn analyze_dependencies_parses_package_json() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("package.json"), r#"{"dependencies": {"react": "18.0.0"}}"#).unwrap();
        let deps = analyze_dependencies(ws.path(), "package.json").await.unwrap();
        assert_eq!(deps, vec!["react".to_string()]);
    }
}
