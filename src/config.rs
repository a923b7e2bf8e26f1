use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chars::DEFAULT_ISKEYWORD;

/// Maximum number of words a single matcher call collects.
pub const MAX_RESULTS: usize = 50;
/// Wall-clock budget of one matcher call, in milliseconds.
pub const TIME_BUDGET_MS: u64 = 150;
/// Candidates examined between two clock/cancellation checks.
pub const BATCH_SIZE: usize = 2_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub matcher: MatcherConfig,
    pub keywords: KeywordsConfig,
    pub sources: SourcesConfig,
    pub file: FileConfig,
    pub around: AroundConfig,
    pub word: WordConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub max_results: usize,
    pub time_budget_ms: u64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Vim-style keyword rule, e.g. `@,48-57,_,192-255`.
    pub iskeyword: String,
    /// Extra keyword characters added on top of `iskeyword`.
    pub extra_chars: Vec<char>,
    pub min_length: usize,
    pub max_line_length: usize,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub buffer: SourceConfig,
    pub around: SourceConfig,
    pub file: SourceConfig,
    pub word: SourceConfig,
}

/// Per-source settings shared by every source.
///
/// `shortcut` and `priority` fall back to the source's own defaults when
/// unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    pub shortcut: Option<String>,
    pub priority: Option<i32>,
    pub trigger_characters: Vec<String>,
    pub trigger_patterns: Vec<String>,
    pub disable_syntaxes: Vec<String>,
    /// Explicit trigger-only flag; implied by non-empty `trigger_patterns`.
    pub trigger_only: Option<bool>,
    /// Only offer words whose first character matches the input's.
    pub first_match: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub ignore_hidden: bool,
    pub ignore_patterns: Vec<String>,
    /// File extensions dropped from completed names when the current file
    /// has the same extension.
    pub trim_same_exts: Vec<String>,
    /// Root marker searched upward from the current file, e.g. `.git`.
    pub root_hint: Option<String>,
    /// Use drive-letter path rules instead of POSIX ones.
    pub drive_letter: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AroundConfig {
    /// Lines above and below the cursor to collect words from.
    pub lines: usize,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct WordConfig {
    /// Word list file, one word per line.
    pub path: Option<PathBuf>,
    pub words: Vec<String>,
}

// --- Defaults ---

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_results: MAX_RESULTS,
            time_budget_ms: TIME_BUDGET_MS,
            batch_size: BATCH_SIZE,
        }
    }
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            iskeyword: DEFAULT_ISKEYWORD.into(),
            extra_chars: Vec::new(),
            min_length: 2,
            max_line_length: 10_000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shortcut: None,
            priority: None,
            trigger_characters: Vec::new(),
            trigger_patterns: Vec::new(),
            disable_syntaxes: Vec::new(),
            trigger_only: None,
            first_match: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            ignore_hidden: true,
            ignore_patterns: Vec::new(),
            trim_same_exts: vec![".ts".into(), ".js".into()],
            root_hint: None,
            drive_letter: cfg!(windows),
        }
    }
}

impl Default for AroundConfig {
    fn default() -> Self {
        Self { lines: 100 }
    }
}

// --- Methods ---

impl Config {
    pub fn default_path() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(|d| PathBuf::from(d).join("wordsource").join("config.toml"))
            .or_else(|| dirs::config_dir().map(|d| d.join("wordsource").join("config.toml")))
            .unwrap_or_else(|| PathBuf::from("~/.config/wordsource/config.toml"))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load the user config, falling back to defaults when it is missing or
    /// invalid.
    pub fn load() -> Self {
        let config_path = Self::default_path();
        if !config_path.exists() {
            return Config::default();
        }
        match Self::from_path(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{e}; using default configuration");
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.matcher.max_results, 50);
        assert_eq!(config.matcher.time_budget_ms, 150);
        assert_eq!(config.keywords.iskeyword, DEFAULT_ISKEYWORD);
        assert!(config.sources.buffer.enabled);
        assert_eq!(config.around.lines, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [matcher]
            max_results = 20

            [sources.file]
            shortcut = "P"
            trigger_patterns = ["\\w+/$"]
            disable_syntaxes = ["comment"]
            "#,
        )
        .unwrap();
        assert_eq!(config.matcher.max_results, 20);
        assert_eq!(config.matcher.batch_size, BATCH_SIZE);
        assert_eq!(config.sources.file.shortcut.as_deref(), Some("P"));
        assert!(config.sources.file.enabled);
        assert_eq!(config.sources.file.disable_syntaxes, vec!["comment"]);
        assert_eq!(config.sources.buffer.shortcut, None);
    }

    #[test]
    fn test_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[matcher\n").unwrap();
        let err = Config::from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err}");

        let missing = Config::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
