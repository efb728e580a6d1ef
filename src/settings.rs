//! Settings infrastructure for gbksync.
//!
//! This module provides support for loading and parsing `gbksync.toml` files
//! to tune the sniffing budget and choose which files are conversion
//! candidates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::encoding::SNIFF_BUDGET;

/// Name of the settings file searched for by [`discover_settings`].
pub const SETTINGS_FILE: &str = "gbksync.toml";

/// Root settings structure loaded from gbksync.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Encoding detection configuration.
    pub sniff: Option<SniffSettings>,

    /// Which files are considered for conversion.
    pub files: Option<FileSettings>,
}

/// Encoding detection settings.
#[derive(Debug, Default, Deserialize)]
pub struct SniffSettings {
    /// Time budget for sniffing one file, in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// File selection settings. Patterns are regular expressions matched against
/// the full path.
#[derive(Debug, Default, Deserialize)]
pub struct FileSettings {
    /// Only paths matching one of these are candidates. Empty or absent means
    /// every file is.
    pub include: Option<Vec<String>>,

    /// Paths matching any of these are never candidates.
    pub exclude: Option<Vec<String>>,
}

impl Settings {
    /// The sniffing time budget, falling back to [`SNIFF_BUDGET`].
    pub fn sniff_budget(&self) -> Duration {
        self.sniff
            .as_ref()
            .and_then(|s| s.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(SNIFF_BUDGET)
    }
}

/// Load settings from a gbksync.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "failed to parse {}: {}", SETTINGS_FILE, e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover gbksync.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found file. If not found, returns
/// `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    // Phase 1: Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Phase 2: Check immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}

/// Compiled include/exclude patterns.
#[derive(Debug, Clone, Default)]
pub struct FilePolicy {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FilePolicy {
    /// Compile the patterns in `settings`, skipping invalid ones.
    pub fn from_settings(settings: &Settings) -> Self {
        let Some(files) = settings.files.as_ref() else {
            return Self::default();
        };
        Self {
            include: compile_patterns(files.include.as_deref().unwrap_or_default()),
            exclude: compile_patterns(files.exclude.as_deref().unwrap_or_default()),
        }
    }

    /// Whether the file at `path` is a conversion candidate.
    pub fn matches(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        if self.exclude.iter().any(|re| re.is_match(&path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(&path))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("ignoring invalid file pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Settings {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn empty_settings_use_defaults() {
        let settings = parse("");
        assert_eq!(settings.sniff_budget(), SNIFF_BUDGET);
        assert!(FilePolicy::from_settings(&settings).matches(Path::new("/a/b.c")));
    }

    #[test]
    fn sniff_timeout_is_read() {
        let settings = parse("[sniff]\ntimeout_ms = 250\n");
        assert_eq!(settings.sniff_budget(), Duration::from_millis(250));
    }

    #[test]
    fn include_patterns_restrict_candidates() {
        let settings = parse(
            r#"
[files]
include = ['(?i)\.(txt|md)$']
"#,
        );
        let policy = FilePolicy::from_settings(&settings);
        assert!(policy.matches(Path::new("/notes/readme.TXT")));
        assert!(policy.matches(Path::new("/notes/todo.md")));
        assert!(!policy.matches(Path::new("/src/main.rs")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let settings = parse(
            r#"
[files]
include = ['\.txt$']
exclude = ['/vendor/']
"#,
        );
        let policy = FilePolicy::from_settings(&settings);
        assert!(policy.matches(Path::new("/project/notes.txt")));
        assert!(!policy.matches(Path::new("/project/vendor/notes.txt")));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let settings = parse(
            r#"
[files]
include = ['(unclosed', '\.txt$']
"#,
        );
        let policy = FilePolicy::from_settings(&settings);
        assert!(policy.matches(Path::new("a.txt")));
        assert!(!policy.matches(Path::new("a.rs")));
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[sniff\ntimeout_ms = ").unwrap();

        let settings = load_settings(&path);
        assert!(settings.sniff.is_none());
    }

    #[test]
    fn discover_settings_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "[sniff]\ntimeout_ms = 10\n").unwrap();

        let (settings, settings_dir) = discover_settings(dir.path());
        assert_eq!(settings_dir, dir.path());
        assert_eq!(settings.sniff_budget(), Duration::from_millis(10));
    }

    #[test]
    fn discover_settings_in_parent_dir() {
        let parent = tempfile::tempdir().unwrap();
        let child = parent.path().join("subdir");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(parent.path().join(SETTINGS_FILE), "[sniff]\ntimeout_ms = 20\n").unwrap();

        let (settings, settings_dir) = discover_settings(&child);
        assert_eq!(settings_dir, parent.path());
        assert_eq!(settings.sniff_budget(), Duration::from_millis(20));
    }

    #[test]
    fn discover_settings_in_child_dir() {
        let parent = tempfile::tempdir().unwrap();
        let child = parent.path().join("config");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(child.join(SETTINGS_FILE), "[files]\ninclude = ['\\.txt$']\n").unwrap();

        let (settings, settings_dir) = discover_settings(parent.path());
        assert_eq!(settings_dir, child);
        assert_eq!(
            settings.files.unwrap().include.unwrap(),
            vec![r"\.txt$".to_string()]
        );
    }

    #[test]
    fn discover_settings_parent_preferred_over_child() {
        let parent = tempfile::tempdir().unwrap();
        let child = parent.path().join("nested");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(parent.path().join(SETTINGS_FILE), "[sniff]\ntimeout_ms = 1\n").unwrap();
        std::fs::write(child.join(SETTINGS_FILE), "[sniff]\ntimeout_ms = 2\n").unwrap();

        let (settings, settings_dir) = discover_settings(parent.path());
        assert_eq!(settings_dir, parent.path());
        assert_eq!(settings.sniff_budget(), Duration::from_millis(1));
    }
}
