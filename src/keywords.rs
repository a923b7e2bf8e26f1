use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::chars::Chars;
use crate::protocol::{TextChange, TextEdit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizeOptions {
    /// Words shorter than this many characters are not indexed.
    pub min_length: usize,
    /// Lines longer than this many bytes are not tokenized.
    pub max_line_length: usize,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_line_length: 10_000,
        }
    }
}

/// Keyword index of one buffer.
///
/// Every token carries a reference count of its occurrences across all
/// lines, so an edit only retokenizes the lines it touches. The word list
/// is ordered most-recent-first: tokens introduced by an edit are placed,
/// in the order they appear in the edited text, ahead of known tokens.
#[derive(Debug, Clone)]
pub struct KeywordsBuffer {
    chars: Chars,
    options: TokenizeOptions,
    lines: Vec<String>,
    counts: HashMap<Arc<str>, usize>,
    words: Arc<Vec<Arc<str>>>,
}

fn tokens<'a>(
    chars: &'a Chars,
    options: TokenizeOptions,
    line: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    let skip = line.len() > options.max_line_length;
    chars
        .words(line)
        .filter(move |word| !skip && word.chars().count() >= options.min_length)
}

impl KeywordsBuffer {
    pub fn new(chars: Chars, options: TokenizeOptions) -> Self {
        Self {
            chars,
            options,
            lines: Vec::new(),
            counts: HashMap::new(),
            words: Arc::new(Vec::new()),
        }
    }

    pub fn from_text(chars: Chars, options: TokenizeOptions, text: &str) -> Self {
        let mut buffer = Self::new(chars, options);
        buffer.set_text(text);
        buffer
    }

    pub fn chars(&self) -> &Chars {
        &self.chars
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.counts.contains_key(word)
    }

    /// Replace the whole content and rebuild the index from scratch.
    pub fn set_text(&mut self, text: &str) {
        self.set_lines(text.split('\n').map(String::from).collect());
    }

    pub fn set_lines(&mut self, lines: Vec<String>) {
        self.lines.clear();
        self.counts.clear();
        self.words = Arc::new(Vec::new());
        self.update(&TextChange {
            start: 0,
            end: 0,
            lines,
        });
    }

    /// Apply a line-range replacement, retokenizing only the touched lines.
    pub fn update(&mut self, change: &TextChange) {
        let start = change.start.min(self.lines.len());
        let end = change.end.clamp(start, self.lines.len());
        let removed_lines: Vec<String> = self
            .lines
            .splice(start..end, change.lines.iter().cloned())
            .collect();

        let mut added: Vec<Arc<str>> = Vec::new();
        for line in &change.lines {
            for word in tokens(&self.chars, self.options, line) {
                match self.counts.get_mut(word) {
                    Some(count) => *count += 1,
                    None => {
                        let word: Arc<str> = Arc::from(word);
                        self.counts.insert(word.clone(), 1);
                        added.push(word);
                    }
                }
            }
        }

        let mut removed: HashSet<&str> = HashSet::new();
        for line in &removed_lines {
            for word in tokens(&self.chars, self.options, line) {
                let Some(count) = self.counts.get_mut(word) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(word);
                    removed.insert(word);
                }
            }
        }

        if added.is_empty() && removed.is_empty() {
            return;
        }

        tracing::trace!(
            added = added.len(),
            removed = removed.len(),
            "Keyword index updated"
        );

        let words = Arc::make_mut(&mut self.words);
        if !removed.is_empty() {
            words.retain(|word| !removed.contains(&**word));
        }
        if !added.is_empty() {
            words.splice(0..0, added);
        }
    }

    /// Apply a character-range edit by converting it to the line range it
    /// replaces.
    pub fn apply_edit(&mut self, edit: &TextEdit) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        let last = self.lines.len() - 1;
        let start_line = edit.start.line.min(last);
        let end_line = edit.end.line.clamp(start_line, last);

        let head = &self.lines[start_line];
        let head = &head[..byte_offset(head, edit.start.character)];
        let tail = &self.lines[end_line];
        let tail_offset = if end_line == start_line {
            byte_offset(tail, edit.end.character).max(head.len())
        } else {
            byte_offset(tail, edit.end.character)
        };
        let tail = &tail[tail_offset..];

        let text = format!("{head}{}{tail}", edit.new_text);
        let lines = text.split('\n').map(String::from).collect();
        self.update(&TextChange {
            start: start_line,
            end: end_line + 1,
            lines,
        });
    }

    /// Current token set, most recently introduced first.
    pub fn get_words(&self) -> Vec<String> {
        self.words.iter().map(|word| word.to_string()).collect()
    }

    /// Lazy pass over a snapshot of the word list, starting at
    /// `start_offset` and wrapping around once.
    pub fn match_words(&self, start_offset: usize) -> MatchWords {
        MatchWords::new(Arc::clone(&self.words), start_offset)
    }

    /// Position in the word list of the earliest-listed token on `linenr`,
    /// used to start a scan next to the cursor.
    pub fn offset_for_line(&self, linenr: usize, exclude: &str) -> usize {
        let Some(line) = self.lines.get(linenr) else {
            return 0;
        };
        let near: HashSet<&str> = tokens(&self.chars, self.options, line)
            .filter(|word| *word != exclude)
            .collect();
        if near.is_empty() {
            return 0;
        }
        self.words
            .iter()
            .position(|word| near.contains(&**word))
            .unwrap_or(0)
    }

    /// Distinct tokens of the lines within `radius` of `linenr`, nearest
    /// lines first (the cursor line, then above and below alternately).
    pub fn words_around(&self, linenr: usize, radius: usize) -> Vec<String> {
        if self.lines.is_empty() {
            return Vec::new();
        }
        let linenr = linenr.min(self.lines.len() - 1);
        let mut order = vec![linenr];
        for distance in 1..=radius {
            let above = linenr.checked_sub(distance);
            let below = Some(linenr + distance).filter(|idx| *idx < self.lines.len());
            if above.is_none() && below.is_none() {
                break;
            }
            order.extend(above);
            order.extend(below);
        }

        let mut seen = HashSet::new();
        let mut words = Vec::new();
        for idx in order {
            for word in tokens(&self.chars, self.options, &self.lines[idx]) {
                if seen.insert(word) {
                    words.push(word.to_string());
                }
            }
        }
        words
    }
}

fn byte_offset(line: &str, character: usize) -> usize {
    line.char_indices()
        .nth(character)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len())
}

/// One wrap-around pass over a word list snapshot.
///
/// The snapshot is shared with the owning buffer until its next edit, so
/// taking one is cheap and later edits never disturb an in-flight scan.
#[derive(Debug, Clone)]
pub struct MatchWords {
    words: Arc<Vec<Arc<str>>>,
    start: usize,
    taken: usize,
}

impl MatchWords {
    fn new(words: Arc<Vec<Arc<str>>>, start_offset: usize) -> Self {
        let start = if words.is_empty() {
            0
        } else {
            start_offset % words.len()
        };
        Self {
            words,
            start,
            taken: 0,
        }
    }
}

impl Iterator for MatchWords {
    type Item = Arc<str>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.words.len();
        if self.taken >= len {
            return None;
        }
        let idx = (self.start + self.taken) % len;
        self.taken += 1;
        Some(Arc::clone(&self.words[idx]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.words.len() - self.taken;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MatchWords {}
