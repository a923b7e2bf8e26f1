pub mod around;
pub mod buffer;
pub mod custom;
pub mod file;
pub mod word;

use std::collections::BTreeSet;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::config::SourceConfig;
use crate::matcher::{MatchSet, ScanOutcome};
use crate::protocol::{CompleteItem, CompleteOption, CompleteResult};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{hook} hook of source '{name}' failed: {message}")]
    Hook {
        name: String,
        hook: Hook,
        message: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory listing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Optional capabilities a source may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    ShouldComplete,
    Refresh,
    OnCompleteDone,
    OnCompleteResolve,
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Hook::ShouldComplete => "shouldComplete",
            Hook::Refresh => "refresh",
            Hook::OnCompleteDone => "onCompleteDone",
            Hook::OnCompleteResolve => "onCompleteResolve",
        };
        f.write_str(name)
    }
}

/// Declared set of hooks a source implements, for host introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalFns(BTreeSet<Hook>);

impl OptionalFns {
    pub fn new(hooks: impl IntoIterator<Item = Hook>) -> Self {
        Self(hooks.into_iter().collect())
    }

    pub fn contains(&self, hook: Hook) -> bool {
        self.0.contains(&hook)
    }

    pub fn iter(&self) -> impl Iterator<Item = Hook> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolved per-source settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub enabled: bool,
    pub shortcut: String,
    pub priority: i32,
    pub trigger_characters: Vec<char>,
    pub trigger_patterns: Vec<Regex>,
    pub disable_syntaxes: Vec<String>,
    pub trigger_only: bool,
    pub first_match: bool,
}

impl SourceSettings {
    pub fn new(shortcut: &str, priority: i32) -> Self {
        Self {
            enabled: true,
            shortcut: shortcut.to_string(),
            priority,
            trigger_characters: Vec::new(),
            trigger_patterns: Vec::new(),
            disable_syntaxes: Vec::new(),
            trigger_only: false,
            first_match: false,
        }
    }

    /// Resolve `config` on top of a source's own shortcut and priority.
    /// Invalid trigger patterns are dropped with a warning.
    pub fn from_config(config: &SourceConfig, shortcut: &str, priority: i32) -> Self {
        let trigger_patterns: Vec<Regex> = config
            .trigger_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Ignoring invalid trigger pattern '{pattern}': {e}");
                    None
                }
            })
            .collect();
        let trigger_only = config
            .trigger_only
            .unwrap_or(!config.trigger_patterns.is_empty());

        Self {
            enabled: config.enabled,
            shortcut: config.shortcut.clone().unwrap_or_else(|| shortcut.to_string()),
            priority: config.priority.unwrap_or(priority),
            trigger_characters: config
                .trigger_characters
                .iter()
                .filter_map(|s| s.chars().next())
                .collect(),
            trigger_patterns,
            disable_syntaxes: config.disable_syntaxes.clone(),
            trigger_only,
            first_match: config.first_match,
        }
    }

    pub fn with_trigger_characters(mut self, chars: &[char]) -> Self {
        for ch in chars {
            if !self.trigger_characters.contains(ch) {
                self.trigger_characters.push(*ch);
            }
        }
        self
    }

    /// Syntax check: `false` when the cursor syntax name contains one of
    /// the disabled syntaxes (case-insensitive).
    pub fn allows_syntax(&self, synname: &str) -> bool {
        if synname.is_empty() {
            return true;
        }
        let synname = synname.to_lowercase();
        !self
            .disable_syntaxes
            .iter()
            .any(|disabled| !disabled.is_empty() && synname.contains(&disabled.to_lowercase()))
    }

    /// Whether the request was started by one of this source's triggers.
    pub fn is_triggered(&self, opt: &CompleteOption) -> bool {
        if opt
            .trigger_character
            .is_some_and(|ch| self.trigger_characters.contains(&ch))
        {
            return true;
        }
        let before = opt.line_before_cursor();
        self.trigger_patterns.iter().any(|re| re.is_match(before))
    }

    /// Menu label shown next to items, e.g. `[B]`.
    pub fn menu(&self) -> Option<String> {
        (!self.shortcut.is_empty()).then(|| format!("[{}]", self.shortcut))
    }
}

/// A candidate generator.
///
/// Every hook is optional: the default implementations are no-ops, and
/// `optional_fns` lists the ones a source actually provides.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    fn settings(&self) -> &SourceSettings;

    fn optional_fns(&self) -> OptionalFns {
        OptionalFns::default()
    }

    fn should_complete(&self, opt: &CompleteOption) -> Result<bool, SourceError> {
        Ok(self.settings().allows_syntax(&opt.synname))
    }

    /// `Ok(None)` means the request was cancelled before any result was
    /// produced, as opposed to an empty result.
    async fn do_complete(
        &self,
        opt: &CompleteOption,
        token: &CancellationToken,
    ) -> Result<Option<CompleteResult>, SourceError>;

    async fn refresh(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn on_complete_done(
        &self,
        _item: &CompleteItem,
        _opt: &CompleteOption,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    async fn on_complete_resolve(
        &self,
        _item: &mut CompleteItem,
        _token: &CancellationToken,
    ) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Turn a finished scan into a source result, or `None` when it was
/// cancelled with nothing collected.
pub(crate) fn scan_result(
    name: &str,
    settings: &SourceSettings,
    items: MatchSet,
    outcome: ScanOutcome,
) -> Option<CompleteResult> {
    if outcome == ScanOutcome::Cancelled && items.is_empty() {
        return None;
    }
    let menu = settings.menu();
    let items = items
        .into_words()
        .into_iter()
        .map(|word| CompleteItem {
            menu: menu.clone(),
            ..CompleteItem::new(word, name)
        })
        .collect();
    Some(CompleteResult {
        items,
        is_incomplete: outcome.is_incomplete(),
    })
}

/// Words that survive the `first_match` setting.
pub(crate) fn first_match_filter(settings: &SourceSettings, input: &str, word: &str) -> bool {
    if !settings.first_match {
        return true;
    }
    match input.chars().next() {
        Some(first) => crate::fuzzy::first_match_fuzzy(first, first.is_ascii(), word),
        None => true,
    }
}
