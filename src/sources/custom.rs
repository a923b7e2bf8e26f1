use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::matcher::Matcher;
use crate::protocol::{CompleteItem, CompleteOption, CompleteResult};
use crate::sources::{
    first_match_filter, scan_result, Hook, OptionalFns, Source, SourceError, SourceSettings,
};

pub type ShouldCompleteFn = Arc<dyn Fn(&CompleteOption) -> anyhow::Result<bool> + Send + Sync>;
/// Returns the replacement word list.
pub type RefreshFn = Arc<dyn Fn() -> anyhow::Result<Vec<String>> + Send + Sync>;
pub type CompleteDoneFn =
    Arc<dyn Fn(&CompleteItem, &CompleteOption) -> anyhow::Result<()> + Send + Sync>;
pub type CompleteResolveFn = Arc<dyn Fn(&mut CompleteItem) -> anyhow::Result<()> + Send + Sync>;

/// User-supplied hooks of a [`CustomSource`]. Unset hooks are no-ops.
#[derive(Clone, Default)]
pub struct SourceHooks {
    pub should_complete: Option<ShouldCompleteFn>,
    pub refresh: Option<RefreshFn>,
    pub on_complete_done: Option<CompleteDoneFn>,
    pub on_complete_resolve: Option<CompleteResolveFn>,
}

impl SourceHooks {
    pub fn should_complete(
        mut self,
        f: impl Fn(&CompleteOption) -> anyhow::Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.should_complete = Some(Arc::new(f));
        self
    }

    pub fn refresh(
        mut self,
        f: impl Fn() -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        self.refresh = Some(Arc::new(f));
        self
    }

    pub fn on_complete_done(
        mut self,
        f: impl Fn(&CompleteItem, &CompleteOption) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_complete_done = Some(Arc::new(f));
        self
    }

    pub fn on_complete_resolve(
        mut self,
        f: impl Fn(&mut CompleteItem) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_complete_resolve = Some(Arc::new(f));
        self
    }

    fn provided(&self) -> OptionalFns {
        let hooks = [
            (Hook::ShouldComplete, self.should_complete.is_some()),
            (Hook::Refresh, self.refresh.is_some()),
            (Hook::OnCompleteDone, self.on_complete_done.is_some()),
            (Hook::OnCompleteResolve, self.on_complete_resolve.is_some()),
        ];
        OptionalFns::new(hooks.into_iter().filter(|(_, set)| *set).map(|(hook, _)| hook))
    }
}

impl std::fmt::Debug for SourceHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.provided().iter()).finish()
    }
}

/// A source defined by the embedding program: a word list plus hooks.
pub struct CustomSource {
    name: String,
    settings: SourceSettings,
    matcher: Matcher,
    words: RwLock<Arc<Vec<String>>>,
    hooks: SourceHooks,
}

impl CustomSource {
    pub fn new(
        name: impl Into<String>,
        settings: SourceSettings,
        matcher: Matcher,
        words: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            matcher,
            words: RwLock::new(Arc::new(words)),
            hooks: SourceHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: SourceHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub async fn words(&self) -> Arc<Vec<String>> {
        self.words.read().await.clone()
    }

    /// Run a hook, turning its error or panic into [`SourceError::Hook`].
    fn call<T>(&self, hook: Hook, f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, SourceError> {
        let message = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("panicked: {reason}")
            }
        };
        Err(SourceError::Hook {
            name: self.name.clone(),
            hook,
            message,
        })
    }
}

#[async_trait]
impl Source for CustomSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn optional_fns(&self) -> OptionalFns {
        self.hooks.provided()
    }

    /// A configured predicate replaces the disabled-syntax check.
    fn should_complete(&self, opt: &CompleteOption) -> Result<bool, SourceError> {
        match &self.hooks.should_complete {
            Some(f) => self.call(Hook::ShouldComplete, || f(opt)),
            None => Ok(self.settings.allows_syntax(&opt.synname)),
        }
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
        Ok(scan_result(&self.name, &self.settings, items, outcome))
    }

    async fn refresh(&self) -> Result<(), SourceError> {
        let Some(f) = &self.hooks.refresh else {
            return Ok(());
        };
        let words = self.call(Hook::Refresh, || f())?;
        *self.words.write().await = Arc::new(words);
        Ok(())
    }

    async fn on_complete_done(
        &self,
        item: &CompleteItem,
        opt: &CompleteOption,
    ) -> Result<(), SourceError> {
        match &self.hooks.on_complete_done {
            Some(f) => self.call(Hook::OnCompleteDone, || f(item, opt)),
            None => Ok(()),
        }
    }

    async fn on_complete_resolve(
        &self,
        item: &mut CompleteItem,
        token: &CancellationToken,
    ) -> Result<(), SourceError> {
        if token.is_cancelled() {
            return Ok(());
        }
        match &self.hooks.on_complete_resolve {
            Some(f) => self.call(Hook::OnCompleteResolve, || f(item)),
            None => Ok(()),
        }
    }
}
