use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chars::Chars;

// --- Buffer notifications (host → engine) ---

/// Replaces lines `[start, end)` of a buffer with `lines`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Zero-based line and character (not byte) offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// Character-range edit, as sent by hosts that report text edits rather
/// than whole replaced lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: Position,
    pub end: Position,
    pub new_text: String,
}

// --- Completion request ---

/// Read-only description of one completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompleteOption {
    pub bufnr: u64,
    /// Full text of the cursor line.
    pub line: String,
    /// Zero-based cursor line.
    pub linenr: usize,
    /// Byte column where `input` starts.
    pub col: usize,
    /// Byte column of the cursor.
    pub colnr: usize,
    /// Keyword text typed before the cursor.
    pub input: String,
    /// Whole keyword under the cursor, including characters after it.
    pub word: String,
    pub synname: String,
    pub filepath: Option<PathBuf>,
    pub cwd: PathBuf,
    pub trigger_character: Option<char>,
    pub trigger_for_in_complete: bool,
}

impl CompleteOption {
    /// Build an option for a cursor at byte column `colnr` of `line`,
    /// deriving `col`, `input` and `word` from the keyword rule.
    pub fn from_cursor(
        bufnr: u64,
        line: impl Into<String>,
        linenr: usize,
        colnr: usize,
        chars: &Chars,
    ) -> Self {
        let line = line.into();
        let mut colnr = colnr.min(line.len());
        while !line.is_char_boundary(colnr) {
            colnr -= 1;
        }

        let before = &line[..colnr];
        let col = before
            .char_indices()
            .rev()
            .take_while(|(_, ch)| chars.is_keyword_char(*ch))
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(colnr);
        let after_len: usize = line[colnr..]
            .chars()
            .take_while(|ch| chars.is_keyword_char(*ch))
            .map(char::len_utf8)
            .sum();

        let input = line[col..colnr].to_string();
        let word = line[col..colnr + after_len].to_string();
        let trigger_character = if input.is_empty() {
            before.chars().last()
        } else {
            None
        };

        Self {
            bufnr,
            linenr,
            col,
            colnr,
            input,
            word,
            trigger_character,
            line,
            ..Default::default()
        }
    }

    pub fn with_filepath(mut self, filepath: impl Into<PathBuf>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_synname(mut self, synname: impl Into<String>) -> Self {
        self.synname = synname.into();
        self
    }

    /// Text of the cursor line up to the cursor.
    pub fn line_before_cursor(&self) -> &str {
        let mut end = self.colnr.min(self.line.len());
        while !self.line.is_char_boundary(end) {
            end -= 1;
        }
        &self.line[..end]
    }
}

// --- Completion results (engine → host) ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteItem {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub source: String,
}

impl CompleteItem {
    pub fn new(word: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            source: source.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteResult {
    pub items: Vec<CompleteItem>,
    /// Set when the scan stopped before the candidates were exhausted.
    #[serde(default)]
    pub is_incomplete: bool,
}

impl CompleteResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn words(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.word.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cursor_splits_input_and_word() {
        let chars = Chars::default();
        let opt = CompleteOption::from_cursor(1, "let foo_bar = 1", 0, 7, &chars);
        assert_eq!(opt.col, 4);
        assert_eq!(opt.input, "foo");
        assert_eq!(opt.word, "foo_bar");
        assert_eq!(opt.trigger_character, None);
        assert_eq!(opt.line_before_cursor(), "let foo");
    }

    #[test]
    fn test_from_cursor_after_trigger_character() {
        let chars = Chars::default();
        let opt = CompleteOption::from_cursor(1, "cat ./", 0, 6, &chars);
        assert_eq!(opt.input, "");
        assert_eq!(opt.col, 6);
        assert_eq!(opt.trigger_character, Some('/'));
    }

    #[test]
    fn test_from_cursor_clamps_column_to_char_boundary() {
        let chars = Chars::default();
        let opt = CompleteOption::from_cursor(1, "你好", 0, 4, &chars);
        assert_eq!(opt.colnr, 3);
        assert_eq!(opt.input, "你");
        assert_eq!(opt.word, "你好");
    }
}
