//! Architectural Enforcement Helpers
//!
//! Source scanning shared by the enforcement tests in `tests/`. The rules
//! themselves live in the test files; this crate only knows how to find
//! production Rust source and strip what should not be scanned.
//!
//! Enforced principles:
//! - The render server is the only writer to the terminal
//! - No ambient global state in the core crate
//! - No sleeping in production code
//! - No panicking shortcuts in production code

#![deny(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

/// A rule violation, printable as `path:line - code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Offending file
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Trimmed source line
    pub code: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.code)
    }
}

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every `.rs` file under `dir`, relative to the workspace root
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of a file: everything before its `#[cfg(test)]` module,
/// with line comments removed
#[must_use]
pub fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            (idx + 1, code.to_string())
        })
        .collect()
}

/// Scan production lines under `dir` for any of `patterns`
#[must_use]
pub fn find_violations(dir: &str, patterns: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for path in rust_sources(dir) {
        for (line, code) in production_lines(&path) {
            if patterns.iter().any(|p| code.contains(p)) {
                violations.push(Violation {
                    path: path.clone(),
                    line,
                    code: code.trim().to_string(),
                });
            }
        }
    }

    violations
}

/// Panic with a readable report if `violations` is not empty
///
/// # Panics
///
/// Panics when any violation is present.
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}
