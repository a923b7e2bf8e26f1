use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::MatcherConfig;
use crate::fuzzy::Pattern;

/// Monotonic time source for the matcher's budget check.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Distinct matched words, capped, in the order they were first accepted.
///
/// A set may be passed to several matcher calls in a row to collect and
/// deduplicate across sources; the matcher only ever adds to it.
#[derive(Debug, Clone)]
pub struct MatchSet {
    cap: usize,
    words: Vec<String>,
    seen: HashSet<String>,
}

impl MatchSet {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            words: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.words.len() >= self.cap
    }

    pub fn contains(&self, word: &str) -> bool {
        self.seen.contains(word)
    }

    /// Add `word` unless it is already present or the set is full.
    pub fn insert(&mut self, word: &str) -> bool {
        if self.is_full() || self.seen.contains(word) {
            return false;
        }
        self.seen.insert(word.to_string());
        self.words.push(word.to_string());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }
}

/// Why a scan stopped. Every variant is a successful outcome; results
/// collected before the stop stay in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every candidate was examined.
    Exhausted,
    /// The result set reached its cap.
    CapReached,
    /// The time budget ran out before the candidates did.
    BudgetExceeded,
    /// The cancellation token fired.
    Cancelled,
}

impl ScanOutcome {
    /// Whether scanning more candidates could have added results.
    pub fn is_incomplete(self) -> bool {
        matches!(self, Self::BudgetExceeded | Self::Cancelled)
    }
}

/// Time- and cancellation-bounded fuzzy matcher.
#[derive(Clone)]
pub struct Matcher {
    max_results: usize,
    time_budget: Duration,
    batch_size: usize,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("max_results", &self.max_results)
            .field("time_budget", &self.time_budget)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl Matcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            max_results: config.max_results.max(1),
            time_budget: Duration::from_millis(config.time_budget_ms),
            batch_size: config.batch_size.max(1),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Empty result set sized for this matcher.
    pub fn new_set(&self) -> MatchSet {
        MatchSet::new(self.max_results)
    }

    /// Scan `streams` in order, adding every word that matches `input` to
    /// `items`.
    ///
    /// `exclude` is the word under the cursor, which is never offered back.
    /// Elapsed time and `token` are checked (and the task yields) once per
    /// batch of candidates rather than per candidate.
    pub async fn get_results<I, S>(
        &self,
        streams: I,
        input: &str,
        exclude: Option<&str>,
        items: &mut MatchSet,
        token: &CancellationToken,
    ) -> ScanOutcome
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if token.is_cancelled() {
            return ScanOutcome::Cancelled;
        }
        if items.is_full() {
            return ScanOutcome::CapReached;
        }

        let pattern = Pattern::new(input);
        let started = self.clock.now();
        let mut examined = 0usize;

        for stream in streams {
            for word in stream {
                examined += 1;
                if examined % self.batch_size == 0 {
                    tokio::task::yield_now().await;
                    if token.is_cancelled() {
                        tracing::debug!(examined, found = items.len(), "Match scan cancelled");
                        return ScanOutcome::Cancelled;
                    }
                    if self.clock.now().saturating_duration_since(started) >= self.time_budget {
                        tracing::debug!(examined, found = items.len(), "Match scan over budget");
                        return ScanOutcome::BudgetExceeded;
                    }
                }

                let word = word.as_ref();
                if word.is_empty() || exclude == Some(word) || items.contains(word) {
                    continue;
                }
                if !pattern.matches(word) {
                    continue;
                }
                items.insert(word);
                if items.is_full() {
                    return ScanOutcome::CapReached;
                }
            }
        }

        ScanOutcome::Exhausted
    }
}
