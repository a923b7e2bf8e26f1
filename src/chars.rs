/// Default keyword rule: letters, digits, underscore and Latin-1 letters.
pub const DEFAULT_ISKEYWORD: &str = "@,48-57,_,192-255";

/// Keyword character class, parsed from a Vim-style `iskeyword` option.
///
/// With `@` in the rule, characters above 255 count as keyword characters
/// whenever they are alphanumeric, so identifiers in non-Latin scripts
/// tokenize as words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chars {
    alpha: bool,
    ranges: Vec<(u32, u32)>,
    excluded: Vec<(u32, u32)>,
}

impl Default for Chars {
    fn default() -> Self {
        Self::parse(DEFAULT_ISKEYWORD)
    }
}

impl Chars {
    pub fn parse(rule: &str) -> Self {
        let mut chars = Self {
            alpha: false,
            ranges: Vec::new(),
            excluded: Vec::new(),
        };

        for item in rule.split(',') {
            if item.is_empty() {
                continue;
            }
            let (item, exclude) = match item.strip_prefix('^') {
                Some(rest) if !rest.is_empty() => (rest, true),
                _ => (item, false),
            };
            if item == "@" {
                chars.alpha = !exclude;
                continue;
            }
            let Some(range) = parse_range(item) else {
                tracing::debug!("Ignoring invalid iskeyword item '{item}'");
                continue;
            };
            if exclude {
                chars.excluded.push(range);
            } else {
                chars.ranges.push(range);
            }
        }

        chars
    }

    /// Parse `rule` and add the characters of `extra` on top of it.
    pub fn with_extra(rule: &str, extra: &[char]) -> Self {
        let mut chars = Self::parse(rule);
        for ch in extra {
            chars.add_keyword(*ch);
        }
        chars
    }

    pub fn add_keyword(&mut self, ch: char) {
        let code = ch as u32;
        self.excluded.retain(|(lo, hi)| !(*lo <= code && code <= *hi));
        self.ranges.push((code, code));
    }

    pub fn is_keyword_char(&self, ch: char) -> bool {
        let code = ch as u32;
        if self.excluded.iter().any(|(lo, hi)| *lo <= code && code <= *hi) {
            return false;
        }
        if self.ranges.iter().any(|(lo, hi)| *lo <= code && code <= *hi) {
            return true;
        }
        if code > 255 {
            return self.alpha && ch.is_alphanumeric();
        }
        self.alpha && ch.is_alphabetic()
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        !word.is_empty() && word.chars().all(|ch| self.is_keyword_char(ch))
    }

    /// Keyword runs of `line`, in order of appearance.
    pub fn words<'a>(&'a self, line: &'a str) -> Words<'a> {
        Words {
            chars: self,
            line,
            pos: 0,
        }
    }
}

pub struct Words<'a> {
    chars: &'a Chars,
    line: &'a str,
    pos: usize,
}

impl<'a> Iterator for Words<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.line[self.pos..];
        let mut start = None;
        for (idx, ch) in rest.char_indices() {
            let keyword = self.chars.is_keyword_char(ch);
            match (start, keyword) {
                (None, true) => start = Some(idx),
                (Some(s), false) => {
                    self.pos += idx;
                    return Some(&rest[s..idx]);
                }
                _ => {}
            }
        }
        self.pos = self.line.len();
        start.map(|s| &rest[s..])
    }
}

fn parse_range(item: &str) -> Option<(u32, u32)> {
    // A lone "-" is the character itself, not a range.
    if item.chars().count() == 1 {
        let code = item.chars().next()? as u32;
        return Some((code, code));
    }
    if let Some((lo, hi)) = split_range(item) {
        let lo = parse_code(lo)?;
        let hi = parse_code(hi)?;
        return (lo <= hi).then_some((lo, hi));
    }
    let code = parse_code(item)?;
    Some((code, code))
}

fn split_range(item: &str) -> Option<(&str, &str)> {
    // Skip the first char so "--47" style items keep a literal '-' on the left.
    let first_len = item.chars().next()?.len_utf8();
    let idx = item[first_len..].find('-')? + first_len;
    Some((&item[..idx], &item[idx + 1..]))
}

fn parse_code(part: &str) -> Option<u32> {
    if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
        return part.parse().ok();
    }
    let mut chars = part.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(chars: &Chars, line: &str) -> Vec<String> {
        chars.words(line).map(String::from).collect()
    }

    #[test]
    fn test_default_rule_splits_identifiers() {
        let chars = Chars::default();
        assert_eq!(
            words(&chars, "let foo_bar = baz2(qux);"),
            vec!["let", "foo_bar", "baz2", "qux"]
        );
    }

    #[test]
    fn test_extra_characters_extend_words() {
        let chars = Chars::with_extra(DEFAULT_ISKEYWORD, &['/', '-']);
        assert_eq!(words(&chars, "see src/main-x.rs"), vec!["see", "src/main-x", "rs"]);
    }

    #[test]
    fn test_ranges_and_exclusions() {
        let chars = Chars::parse("a-c,48-49,^b");
        assert!(chars.is_keyword_char('a'));
        assert!(!chars.is_keyword_char('b'));
        assert!(chars.is_keyword_char('1'));
        assert!(!chars.is_keyword_char('2'));
        assert!(!chars.is_keyword_char('z'));
    }

    #[test]
    fn test_non_latin_scripts_are_keywords() {
        let chars = Chars::default();
        assert_eq!(words(&chars, "你好 world"), vec!["你好", "world"]);
        assert!(chars.is_keyword("âbc"));
    }

    #[test]
    fn test_non_latin_scripts_need_alpha_item() {
        let digits = Chars::parse("48-57");
        assert!(!digits.is_keyword_char('你'));
        assert!(!digits.is_keyword_char('é'));
        assert_eq!(words(&digits, "12你好34"), vec!["12", "34"]);

        let ranged = Chars::parse("48-57,20320-20320");
        assert!(ranged.is_keyword_char('你'));
        assert!(!ranged.is_keyword_char('好'));
    }

    #[test]
    fn test_trailing_word_without_separator() {
        let chars = Chars::default();
        assert_eq!(words(&chars, "  end"), vec!["end"]);
        assert!(words(&chars, "  ;; ").is_empty());
    }
}
