use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::{SourceConfig, WordConfig};
use crate::matcher::Matcher;
use crate::protocol::{CompleteOption, CompleteResult};
use crate::sources::{
    first_match_filter, scan_result, Hook, OptionalFns, Source, SourceError, SourceSettings,
};

/// Completes from a fixed word list, inline or loaded from a file.
pub struct WordSource {
    settings: SourceSettings,
    matcher: Matcher,
    path: Option<PathBuf>,
    inline: Vec<String>,
    words: RwLock<Arc<Vec<String>>>,
}

impl WordSource {
    pub const NAME: &'static str = "word";

    pub fn new(config: &SourceConfig, word_config: &WordConfig, matcher: Matcher) -> Self {
        Self {
            settings: SourceSettings::from_config(config, "W", 0),
            matcher,
            path: word_config.path.clone(),
            inline: word_config.words.clone(),
            words: RwLock::new(Arc::new(dedup(word_config.words.iter().cloned()))),
        }
    }

    /// Build a source and load its word file right away.
    pub async fn load(
        config: &SourceConfig,
        word_config: &WordConfig,
        matcher: Matcher,
    ) -> Result<Self, SourceError> {
        let source = Self::new(config, word_config, matcher);
        source.refresh().await?;
        Ok(source)
    }

    pub async fn words(&self) -> Arc<Vec<String>> {
        self.words.read().await.clone()
    }
}

/// Keep the first occurrence of each non-empty, trimmed word.
fn dedup(words: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    words
        .into_iter()
        .map(|word| word.trim().to_string())
        .filter(|word| !word.is_empty() && seen.insert(word.clone()))
        .collect()
}

#[async_trait]
impl Source for WordSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn optional_fns(&self) -> OptionalFns {
        OptionalFns::new([Hook::Refresh])
    }

    async fn do_complete(
        &self,
        opt: &CompleteOption,
        token: &CancellationToken,
    ) -> Result<Option<CompleteResult>, SourceError> {
        let words = self.words().await;
        let candidates: Vec<&String> = words
            .iter()
            .filter(|word| first_match_filter(&self.settings, &opt.input, word))
            .collect();

        let mut items = self.matcher.new_set();
        let outcome = self
            .matcher
            .get_results([candidates], &opt.input, Some(opt.word.as_str()), &mut items, token)
            .await;
        Ok(scan_result(Self::NAME, &self.settings, items, outcome))
    }

    /// Reload the word file. Inline words come first.
    async fn refresh(&self) -> Result<(), SourceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = tokio::fs::read_to_string(path).await?;
        let words = dedup(
            self.inline
                .iter()
                .cloned()
                .chain(contents.lines().map(String::from)),
        );
        tracing::debug!(path = %path.display(), count = words.len(), "Loaded word list");
        *self.words.write().await = Arc::new(words);
        Ok(())
    }
}
