use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::buffers::Buffers;
use crate::config::{Config, MAX_RESULTS};
use crate::matcher::{MatchSet, Matcher};
use crate::path::{PathResolver, PathStyle};
use crate::protocol::{CompleteItem, CompleteOption, CompleteResult};
use crate::sources::around::AroundSource;
use crate::sources::buffer::BufferSource;
use crate::sources::file::FileSource;
use crate::sources::word::WordSource;
use crate::sources::Source;

/// Runs the applicable sources for a request and merges their results.
pub struct Engine {
    buffers: Buffers,
    /// Cap on the merged result.
    max_results: usize,
    /// Sorted by descending priority, registration order within a priority.
    sources: Vec<Arc<dyn Source>>,
}

impl Engine {
    pub fn new(buffers: Buffers) -> Self {
        Self {
            buffers,
            max_results: MAX_RESULTS,
            sources: Vec::new(),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Engine with the built-in sources configured by `config`.
    pub async fn from_config(config: &Config, buffers: Buffers) -> Self {
        let matcher = Matcher::new(&config.matcher);
        let sources = &config.sources;
        let mut engine = Self::new(buffers.clone()).with_max_results(matcher.max_results());

        engine.register(Arc::new(BufferSource::new(
            &sources.buffer,
            buffers.clone(),
            matcher.clone(),
        )));
        engine.register(Arc::new(AroundSource::new(
            &sources.around,
            buffers,
            matcher.clone(),
            config.around.lines,
        )));

        let style = PathStyle::from_drive_letter(config.file.drive_letter);
        engine.register(Arc::new(FileSource::new(
            &sources.file,
            &config.file,
            PathResolver::from_process_env(style),
            matcher.clone(),
        )));

        let word = WordSource::new(&sources.word, &config.word, matcher);
        if let Err(e) = word.refresh().await {
            tracing::warn!("Failed to load word list: {e}");
        }
        engine.register(Arc::new(word));

        engine
    }

    /// Add a source, replacing any source with the same name.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.retain(|existing| existing.name() != source.name());
        let priority = source.settings().priority;
        let idx = self
            .sources
            .iter()
            .position(|existing| existing.settings().priority < priority)
            .unwrap_or(self.sources.len());
        tracing::debug!(name = source.name(), priority, "Registered source");
        self.sources.insert(idx, source);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.name() != name);
        self.sources.len() != before
    }

    pub fn buffers(&self) -> &Buffers {
        &self.buffers
    }

    pub fn source(&self, name: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|source| source.name() == name)
    }

    /// Source names in the order they are run.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    fn is_applicable(&self, source: &dyn Source, opt: &CompleteOption) -> bool {
        let settings = source.settings();
        if !settings.enabled {
            return false;
        }
        if settings.trigger_only && !settings.is_triggered(opt) {
            return false;
        }
        match source.should_complete(opt) {
            Ok(applicable) => applicable,
            Err(e) => {
                tracing::warn!(source = source.name(), "Skipping source: {e}");
                false
            }
        }
    }

    /// Complete `opt` from every applicable source, highest priority
    /// first. Words already offered by an earlier source are dropped and
    /// the merged result holds at most `max_results` items.
    ///
    /// Returns `None` when `token` was cancelled before any source produced
    /// a result.
    pub async fn complete(
        &self,
        opt: &CompleteOption,
        token: &CancellationToken,
    ) -> Option<CompleteResult> {
        let mut merged: Option<CompleteResult> = None;
        let mut seen = MatchSet::new(self.max_results);

        for source in &self.sources {
            if token.is_cancelled() || seen.is_full() {
                break;
            }
            if !self.is_applicable(source.as_ref(), opt) {
                continue;
            }
            let result = match source.do_complete(opt, token).await {
                Ok(Some(result)) => result,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(source = source.name(), "Source failed: {e}");
                    continue;
                }
            };
            tracing::debug!(
                source = source.name(),
                items = result.items.len(),
                incomplete = result.is_incomplete,
                "Source completed"
            );
            let target = merged.get_or_insert_with(CompleteResult::empty);
            target.is_incomplete |= result.is_incomplete;
            target.items.extend(
                result
                    .items
                    .into_iter()
                    .filter(|item| seen.insert(&item.word)),
            );
        }

        if token.is_cancelled() {
            return merged.map(|mut result| {
                result.is_incomplete = true;
                result
            });
        }
        Some(merged.unwrap_or_default())
    }

    /// Refresh every source, or only `name`. Failures are logged.
    pub async fn refresh(&self, name: Option<&str>) {
        for source in &self.sources {
            if name.is_some_and(|name| name != source.name()) {
                continue;
            }
            if let Err(e) = source.refresh().await {
                tracing::warn!(source = source.name(), "Refresh failed: {e}");
            }
        }
    }

    /// Notify the source that produced `item` that it was accepted.
    pub async fn on_complete_done(&self, item: &CompleteItem, opt: &CompleteOption) {
        let Some(source) = self.source(&item.source) else {
            return;
        };
        if let Err(e) = source.on_complete_done(item, opt).await {
            tracing::warn!(source = source.name(), "Completion callback failed: {e}");
        }
    }

    /// Let the producing source fill in details of `item`.
    pub async fn resolve(&self, item: &mut CompleteItem, token: &CancellationToken) {
        let Some(source) = self.source(&item.source) else {
            return;
        };
        if let Err(e) = source.on_complete_resolve(item, token).await {
            tracing::warn!(source = source.name(), "Resolve failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::sources::custom::{CustomSource, SourceHooks};
    use crate::sources::SourceSettings;
    use crate::test_helpers::option_at;

    fn custom(name: &str, priority: i32, words: &[&str]) -> CustomSource {
        CustomSource::new(
            name,
            SourceSettings::new(&name[..1].to_uppercase(), priority),
            Matcher::default(),
            words.iter().map(|w| w.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_priority_order_and_cross_source_dedup() {
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(custom("low", 1, &["alpha", "alpine"])));
        engine.register(Arc::new(custom("high", 9, &["alpine", "altitude"])));
        assert_eq!(engine.source_names(), vec!["high", "low"]);

        let result = engine
            .complete(&option_at(1, "al", 0, 2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.words(), vec!["alpine", "altitude", "alpha"]);
        assert_eq!(result.items[0].menu.as_deref(), Some("[H]"));
        assert_eq!(result.items[2].source, "low");
    }

    #[tokio::test]
    async fn test_merged_result_is_capped() {
        let buffer_words: Vec<String> = (0..80).map(|i| format!("aa{i:03}")).collect();
        let list_words: Vec<String> = (0..80).map(|i| format!("ab{i:03}")).collect();
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(CustomSource::new(
            "first",
            SourceSettings::new("F", 5),
            Matcher::default(),
            buffer_words,
        )));
        engine.register(Arc::new(CustomSource::new(
            "second",
            SourceSettings::new("S", 1),
            Matcher::default(),
            list_words,
        )));

        let result = engine
            .complete(&option_at(1, "a", 0, 1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.items.len(), MAX_RESULTS);
        assert!(result.items.iter().all(|item| item.source == "first"));

        let engine = engine.with_max_results(60);
        let result = engine
            .complete(&option_at(1, "a", 0, 1), &CancellationToken::new())
            .await
            .unwrap();
        let words = result.words();
        assert_eq!(words.len(), 60);
        assert_eq!(words[49], "aa049");
        assert_eq!(words[50], "ab000");
    }

    #[tokio::test]
    async fn test_completion_runs_on_spawned_task() {
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(custom("words", 1, &["alpha", "alps"])));
        let engine = Arc::new(engine);

        let handle = tokio::spawn(async move {
            engine
                .complete(&option_at(1, "al", 0, 2), &CancellationToken::new())
                .await
        });
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.words(), vec!["alpha", "alps"]);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(custom("broken", 5, &["alpha"]).with_hooks(
            SourceHooks::default().should_complete(|_| anyhow::bail!("predicate failed")),
        )));
        engine.register(Arc::new(custom("fine", 1, &["alps"])));

        let result = engine
            .complete(&option_at(1, "al", 0, 2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.words(), vec!["alps"]);
    }

    #[tokio::test]
    async fn test_trigger_only_and_disabled_sources() {
        let mut engine = Engine::new(Buffers::default());
        let config = SourceConfig {
            trigger_characters: vec![".".into()],
            trigger_only: Some(true),
            ..SourceConfig::default()
        };
        engine.register(Arc::new(CustomSource::new(
            "member",
            SourceSettings::from_config(&config, "M", 5),
            Matcher::default(),
            vec!["length".into()],
        )));
        let mut disabled = SourceSettings::new("D", 9);
        disabled.enabled = false;
        engine.register(Arc::new(CustomSource::new(
            "disabled",
            disabled,
            Matcher::default(),
            vec!["len".into(), "lemma".into()],
        )));

        let token = CancellationToken::new();
        let typed = engine.complete(&option_at(1, "le", 0, 2), &token).await.unwrap();
        assert!(typed.items.is_empty());

        let triggered = engine.complete(&option_at(1, "s.", 0, 2), &token).await.unwrap();
        assert_eq!(triggered.words(), vec!["length"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_none() {
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(custom("words", 1, &["alpha"])));
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(engine.complete(&option_at(1, "al", 0, 2), &token).await, None);
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let mut engine = Engine::new(Buffers::default());
        engine.register(Arc::new(custom("words", 1, &["alpha"])));
        engine.register(Arc::new(custom("words", 2, &["alps"])));
        assert_eq!(engine.source_names(), vec!["words"]);
        assert!(engine.unregister("words"));
        assert!(!engine.unregister("words"));
    }

    #[tokio::test]
    async fn test_from_config_registers_builtin_sources() {
        let buffers = Buffers::default();
        buffers
            .attach(1, vec!["configure config".into(), "co".into()], &[])
            .await;
        let mut config = Config::default();
        config.word.words = vec!["coffee".into()];
        let engine = Engine::from_config(&config, buffers).await;
        assert_eq!(engine.source_names(), vec!["file", "around", "buffer", "word"]);

        let result = engine
            .complete(&option_at(1, "co", 1, 2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.words(), vec!["configure", "config", "coffee"]);
        assert_eq!(result.items[0].source, "around");
    }
}
