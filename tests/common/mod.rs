#![allow(dead_code)]

use std::path::Path;

use wordsource::chars::Chars;
use wordsource::protocol::CompleteOption;

pub fn lines(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

/// Cursor at the end of `line` in buffer `bufnr`.
pub fn option_at_end(bufnr: u64, line: &str, linenr: usize, cwd: &Path) -> CompleteOption {
    CompleteOption::from_cursor(bufnr, line, linenr, line.len(), &Chars::default()).with_cwd(cwd)
}

pub fn words(n: usize, prefix: &str) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i:05}")).collect()
}
