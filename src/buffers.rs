use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chars::Chars;
use crate::config::KeywordsConfig;
use crate::keywords::{KeywordsBuffer, MatchWords, TokenizeOptions};
use crate::protocol::{TextChange, TextEdit};

/// Keyword indexes of every attached buffer, shared by the sources.
#[derive(Debug, Clone)]
pub struct Buffers {
    inner: Arc<RwLock<HashMap<u64, KeywordsBuffer>>>,
    config: KeywordsConfig,
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new(KeywordsConfig::default())
    }
}

impl Buffers {
    pub fn new(config: KeywordsConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    fn chars(&self, extra: &[char]) -> Chars {
        let mut chars = Chars::with_extra(&self.config.iskeyword, &self.config.extra_chars);
        for ch in extra {
            chars.add_keyword(*ch);
        }
        chars
    }

    fn options(&self) -> TokenizeOptions {
        TokenizeOptions {
            min_length: self.config.min_length,
            max_line_length: self.config.max_line_length,
        }
    }

    /// Index `lines` as buffer `bufnr`, replacing any previous index.
    /// `extra` adds buffer-specific keyword characters.
    pub async fn attach(&self, bufnr: u64, lines: Vec<String>, extra: &[char]) {
        let mut buffer = KeywordsBuffer::new(self.chars(extra), self.options());
        buffer.set_lines(lines);
        tracing::debug!(bufnr, words = buffer.len(), "Attached buffer");
        self.inner.write().await.insert(bufnr, buffer);
    }

    pub async fn detach(&self, bufnr: u64) -> bool {
        let removed = self.inner.write().await.remove(&bufnr).is_some();
        if removed {
            tracing::debug!(bufnr, "Detached buffer");
        }
        removed
    }

    pub async fn is_attached(&self, bufnr: u64) -> bool {
        self.inner.read().await.contains_key(&bufnr)
    }

    /// Apply a line-range change. Returns `false` for unknown buffers.
    pub async fn apply_change(&self, bufnr: u64, change: &TextChange) -> bool {
        match self.inner.write().await.get_mut(&bufnr) {
            Some(buffer) => {
                buffer.update(change);
                true
            }
            None => false,
        }
    }

    pub async fn apply_edit(&self, bufnr: u64, edit: &TextEdit) -> bool {
        match self.inner.write().await.get_mut(&bufnr) {
            Some(buffer) => {
                buffer.apply_edit(edit);
                true
            }
            None => false,
        }
    }

    pub async fn words(&self, bufnr: u64) -> Option<Vec<String>> {
        self.inner.read().await.get(&bufnr).map(KeywordsBuffer::get_words)
    }

    /// Word streams for a scan: the current buffer first, starting next to
    /// the cursor line, then every other buffer in ascending id order.
    pub async fn streams(&self, current: u64, linenr: usize, exclude: &str) -> Vec<MatchWords> {
        let buffers = self.inner.read().await;
        let mut streams = Vec::with_capacity(buffers.len());
        if let Some(buffer) = buffers.get(&current) {
            streams.push(buffer.match_words(buffer.offset_for_line(linenr, exclude)));
        }
        let mut others: Vec<_> = buffers.iter().filter(|(id, _)| **id != current).collect();
        others.sort_by_key(|(id, _)| **id);
        streams.extend(others.into_iter().map(|(_, buffer)| buffer.match_words(0)));
        streams
    }

    pub async fn words_around(&self, bufnr: u64, linenr: usize, radius: usize) -> Vec<String> {
        self.inner
            .read()
            .await
            .get(&bufnr)
            .map(|buffer| buffer.words_around(linenr, radius))
            .unwrap_or_default()
    }
}
