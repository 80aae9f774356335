//! Source-tree scanning for layering checks.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A source line that matched one of the forbidden patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub file: String,
    pub line: usize,
    pub text: String,
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.text.trim())
    }
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn display_path(path: &Path) -> String {
    let root = manifest_dir();
    path.strip_prefix(&root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot list {}: {e}", dir.display()))
        .map(|entry| entry.expect("directory entry").path())
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

/// Every line under `dir` (relative to the crate root) containing any of
/// `patterns`. Comment lines count too, so doc links can't sneak a
/// dependency past the check.
pub fn lines_matching(dir: &str, patterns: &[&str]) -> Vec<Hit> {
    let mut files = Vec::new();
    walk(&manifest_dir().join(dir), &mut files);

    files
        .iter()
        .flat_map(|file| {
            let source = fs::read_to_string(file)
                .unwrap_or_else(|e| panic!("cannot read {}: {e}", file.display()));
            let name = display_path(file);
            source
                .lines()
                .enumerate()
                .filter(|(_, text)| patterns.iter().any(|p| text.contains(p)))
                .map(|(index, text)| Hit {
                    file: name.clone(),
                    line: index + 1,
                    text: text.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Whether `path`, relative to the crate root, exists.
pub fn exists(path: &str) -> bool {
    manifest_dir().join(path).exists()
}

/// Render hits one per line for assertion messages.
pub fn report(hits: &[Hit]) -> String {
    hits.iter().map(Hit::to_string).collect::<Vec<_>>().join("\n")
}
