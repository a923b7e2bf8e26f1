use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use moka::future::Cache;
use tokio_util::sync::CancellationToken;

use crate::config::{FileConfig, SourceConfig};
use crate::matcher::Matcher;
use crate::path::{
    filter_files, get_items_from_root, path_fragment, ExcludeSet, FileItem, PathResolver,
    PathStyle,
};
use crate::protocol::{CompleteItem, CompleteOption, CompleteResult};
use crate::sources::{scan_result, Source, SourceError, SourceSettings};

/// Completes file and directory names after a typed path fragment.
pub struct FileSource {
    settings: SourceSettings,
    resolver: PathResolver,
    matcher: Matcher,
    config: FileConfig,
    exclude: ExcludeSet,
    dir_cache: Cache<PathBuf, Vec<FileItem>>,
}

impl FileSource {
    pub const NAME: &'static str = "file";

    pub fn new(
        config: &SourceConfig,
        file_config: &FileConfig,
        resolver: PathResolver,
        matcher: Matcher,
    ) -> Self {
        let settings = SourceSettings::from_config(config, "F", 10)
            .with_trigger_characters(resolver.style().trigger_characters());
        Self {
            settings,
            exclude: ExcludeSet::new(&file_config.ignore_patterns),
            config: file_config.clone(),
            resolver,
            matcher,
            dir_cache: Cache::builder()
                .max_capacity(200)
                .time_to_live(std::time::Duration::from_secs(5))
                .build(),
        }
    }

    fn style(&self) -> PathStyle {
        self.resolver.style()
    }

    /// List directory entries, using cache.
    async fn list_dir(&self, dir: &Path) -> Result<Vec<FileItem>, SourceError> {
        if let Some(items) = self.dir_cache.get(dir).await {
            return Ok(items);
        }
        let key = dir.to_path_buf();
        let exclude = self.exclude.clone();
        let root = key.clone();
        let items = tokio::task::spawn_blocking(move || {
            get_items_from_root(&root, &root, false, &exclude)
        })
        .await?;
        self.dir_cache.insert(key, items.clone()).await;
        Ok(items)
    }

    /// Completed word for `name`, dropping the extension it shares with the
    /// current file when configured to.
    fn completion_word(&self, name: &str, is_dir: bool, current_ext: Option<&str>) -> String {
        if is_dir {
            return name.to_string();
        }
        if let (Some(ext), Some(dot)) = (current_ext, name.rfind('.')) {
            let file_ext = &name[dot..];
            if dot > 0 && file_ext == ext && self.config.trim_same_exts.iter().any(|e| e == ext) {
                return name[..dot].to_string();
            }
        }
        name.to_string()
    }
}

fn extension_of(filepath: Option<&Path>) -> Option<String> {
    let ext = filepath?.extension()?.to_str()?;
    Some(format!(".{ext}"))
}

#[async_trait]
impl Source for FileSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn should_complete(&self, opt: &CompleteOption) -> Result<bool, SourceError> {
        Ok(self.settings.allows_syntax(&opt.synname)
            && path_fragment(opt.line_before_cursor(), self.style()).is_some())
    }

    async fn do_complete(
        &self,
        opt: &CompleteOption,
        token: &CancellationToken,
    ) -> Result<Option<CompleteResult>, SourceError> {
        let style = self.style();
        let Some(fragment) = path_fragment(opt.line_before_cursor(), style) else {
            return Ok(Some(CompleteResult::empty()));
        };
        let filepath = opt.filepath.as_deref().and_then(Path::to_str);
        let cwd = opt.cwd.to_string_lossy();
        let Some(root) = self.resolver.get_root(
            style.dir_part(fragment),
            self.config.root_hint.as_deref(),
            filepath,
            &cwd,
        ) else {
            tracing::debug!(fragment, "Unresolved completion root");
            return Ok(Some(CompleteResult::empty()));
        };

        let entries = self.list_dir(&root).await?;
        if token.is_cancelled() {
            return Ok(None);
        }

        let prefix = style.file_part(fragment);
        let exclude_hidden = self.config.ignore_hidden && !prefix.starts_with('.');
        let kinds: HashMap<&str, bool> = entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.is_dir))
            .collect();
        let names = filter_files(
            entries.iter().map(|entry| Some(entry.name.as_str())),
            exclude_hidden,
            &self.exclude,
        );

        let mut items = self.matcher.new_set();
        let outcome = self
            .matcher
            .get_results([&names], prefix, None, &mut items, token)
            .await;
        let Some(mut result) = scan_result(Self::NAME, &self.settings, items, outcome) else {
            return Ok(None);
        };

        let current_ext = extension_of(opt.filepath.as_deref());
        let separator = style.separator();
        result.items = result
            .items
            .into_iter()
            .map(|item| {
                let is_dir = kinds.get(item.word.as_str()).copied().unwrap_or(false);
                CompleteItem {
                    word: self.completion_word(&item.word, is_dir, current_ext.as_deref()),
                    abbr: Some(if is_dir {
                        format!("{}{separator}", item.word)
                    } else {
                        item.word.clone()
                    }),
                    kind: Some(if is_dir { "dir" } else { "file" }.to_string()),
                    ..item
                }
            })
            .collect();
        Ok(Some(result))
    }
}
