use crate::chars::Chars;
use crate::protocol::CompleteOption;

/// Option for a cursor at byte column `col` of `line`, with the default
/// keyword rule and `/` as working directory.
pub fn option_at(bufnr: u64, line: &str, linenr: usize, col: usize) -> CompleteOption {
    CompleteOption::from_cursor(bufnr, line, linenr, col, &Chars::default()).with_cwd("/")
}
