use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use wordsource::config::MatcherConfig;
use wordsource::matcher::{Clock, Matcher, ScanOutcome};

mod common;

/// Cancels `token` on the `at`-th read of the clock.
struct CancellingClock {
    token: CancellationToken,
    at: u32,
    reads: AtomicU32,
}

impl Clock for CancellingClock {
    fn now(&self) -> Instant {
        if self.reads.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
            self.token.cancel();
        }
        Instant::now()
    }
}

#[tokio::test]
async fn test_immediate_cancellation_of_large_scan() {
    let candidates = common::words(80_000, "candidate");
    let matcher = Matcher::default();
    let token = CancellationToken::new();
    token.cancel();

    let started = Instant::now();
    let mut items = matcher.new_set();
    let outcome = matcher
        .get_results([&candidates], "cand", None, &mut items, &token)
        .await;

    assert_eq!(outcome, ScanOutcome::Cancelled);
    assert!(outcome.is_incomplete());
    assert!(items.is_empty());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_cancellation_mid_scan_keeps_partial_results() {
    // Only every 1000th word matches, so the cap is never reached before
    // the second batch boundary.
    let candidates: Vec<String> = (0..80_000)
        .map(|i| {
            if i % 1000 == 0 {
                format!("match{i}")
            } else {
                format!("other{i}")
            }
        })
        .collect();
    let token = CancellationToken::new();
    let clock = Arc::new(CancellingClock {
        token: token.clone(),
        at: 2,
        reads: AtomicU32::new(0),
    });
    let matcher = Matcher::new(&MatcherConfig {
        batch_size: 2000,
        ..MatcherConfig::default()
    })
    .with_clock(clock);

    let mut items = matcher.new_set();
    let outcome = matcher
        .get_results([&candidates], "ma", None, &mut items, &token)
        .await;

    assert_eq!(outcome, ScanOutcome::Cancelled);
    // Cancelled while checking the budget at the first boundary, observed
    // at the second.
    assert_eq!(items.len(), 4);
    assert_eq!(items.iter().next(), Some("match0"));
}

#[tokio::test]
async fn test_full_scan_under_real_clock_completes() {
    let candidates = common::words(80_000, "w");
    let matcher = Matcher::default();
    let mut items = matcher.new_set();
    let outcome = matcher
        .get_results([&candidates], "zz", None, &mut items, &CancellationToken::new())
        .await;
    assert!(matches!(
        outcome,
        ScanOutcome::Exhausted | ScanOutcome::BudgetExceeded
    ));
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_cjk_pattern_matches_by_substring() {
    let candidates = vec!["你好世界", "世界", "hello", "再见世界"];
    let matcher = Matcher::default();
    let mut items = matcher.new_set();
    let outcome = matcher
        .get_results([candidates], "世界", None, &mut items, &CancellationToken::new())
        .await;
    assert_eq!(outcome, ScanOutcome::Exhausted);
    assert_eq!(items.into_words(), vec!["你好世界", "世界", "再见世界"]);
}

#[tokio::test]
async fn test_diacritics_and_underscores() {
    let candidates = vec!["âge", "_apple", "__Ärger", "bag", "Apfel"];
    let matcher = Matcher::default();
    let mut items = matcher.new_set();
    matcher
        .get_results([candidates], "a", None, &mut items, &CancellationToken::new())
        .await;
    assert_eq!(items.into_words(), vec!["âge", "_apple", "__Ärger", "Apfel"]);
}
