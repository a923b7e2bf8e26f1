//! Character-level matching rules shared by every source.

/// Lowercase ASCII base letter of a Latin letter carrying a diacritic.
pub fn base_letter(ch: char) -> Option<char> {
    let base = match ch {
        'À'..='Å' | 'à'..='å' | 'Ā'..='ą' => 'a',
        'Ç' | 'ç' | 'Ć'..='č' => 'c',
        'Ð' | 'ð' | 'Ď'..='đ' => 'd',
        'È'..='Ë' | 'è'..='ë' | 'Ē'..='ě' => 'e',
        'Ĝ'..='ģ' => 'g',
        'Ĥ'..='ħ' => 'h',
        'Ì'..='Ï' | 'ì'..='ï' | 'Ĩ'..='ı' => 'i',
        'Ĵ' | 'ĵ' => 'j',
        'Ķ' | 'ķ' => 'k',
        'Ĺ'..='ł' => 'l',
        'Ñ' | 'ñ' | 'Ń'..='ň' => 'n',
        'Ò'..='Ö' | 'Ø' | 'ò'..='ö' | 'ø' | 'Ō'..='ő' => 'o',
        'Ŕ'..='ř' => 'r',
        'Ś'..='š' => 's',
        'Ţ'..='ŧ' => 't',
        'Ù'..='Ü' | 'ù'..='ü' | 'Ũ'..='ų' => 'u',
        'Ŵ' | 'ŵ' => 'w',
        'Ý' | 'ý' | 'ÿ' | 'Ŷ'..='Ÿ' => 'y',
        'Ź'..='ž' => 'z',
        _ => return None,
    };
    Some(base)
}

/// Case- and diacritic-insensitive form of `ch`.
pub fn fold(ch: char) -> char {
    if ch.is_ascii() {
        return ch.to_ascii_lowercase();
    }
    base_letter(ch).unwrap_or_else(|| ch.to_lowercase().next().unwrap_or(ch))
}

fn eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Whether `ch` belongs to a script the Latin fuzzy rule cannot judge.
fn is_non_latin(ch: char) -> bool {
    !ch.is_ascii() && base_letter(ch).is_none() && ch.is_alphanumeric()
}

/// First-character rule of the fuzzy match.
///
/// `first` is the first character of the typed pattern and `ascii` tells
/// whether it is an ASCII character. The candidate matches when its first
/// character equals `first` ignoring case, or, for an ASCII letter, when
/// its first non-underscore character is `first` with a diacritic.
pub fn first_match_fuzzy(first: char, ascii: bool, word: &str) -> bool {
    let Some(head) = word.chars().next() else {
        return false;
    };
    if eq_ignore_case(head, first) {
        return true;
    }
    if !ascii || !first.is_ascii_alphabetic() {
        return false;
    }
    let first = first.to_ascii_lowercase();
    word.chars()
        .find(|ch| *ch != '_')
        .is_some_and(|ch| fold(ch) == first)
}

/// Typed input prepared for repeated matching.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    folded: Vec<char>,
    substring_only: bool,
}

impl Pattern {
    pub fn new(input: &str) -> Self {
        let folded: Vec<char> = input.chars().map(fold).collect();
        let substring_only = !input.is_empty()
            && input
                .chars()
                .all(|ch| !ch.is_ascii() && base_letter(ch).is_none());
        Self {
            raw: input.to_string(),
            folded,
            substring_only,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Prefix-anchored fuzzy match of `word` against the pattern.
    ///
    /// Patterns made only of non-Latin characters match by substring.
    /// A candidate starting with a non-Latin character cannot be judged
    /// against an ASCII pattern and is accepted as-is.
    pub fn matches(&self, word: &str) -> bool {
        let Some(&first) = self.folded.first() else {
            return true;
        };
        if self.substring_only {
            return word.contains(self.raw.as_str());
        }

        let raw_first = self.raw.chars().next().unwrap_or(first);
        if !first_match_fuzzy(raw_first, raw_first.is_ascii(), word) {
            return raw_first.is_ascii()
                && word
                    .chars()
                    .find(|ch| *ch != '_')
                    .is_some_and(is_non_latin);
        }
        if word.chars().count() < self.folded.len() {
            return false;
        }

        let mut rest = word.chars().map(fold);
        // Consume up to and including the character matched by the first rule.
        if !rest.any(|ch| ch == first) {
            return false;
        }
        let mut pending = self.folded[1..].iter().peekable();
        for ch in rest {
            match pending.peek() {
                Some(want) if **want == ch => {
                    pending.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        pending.peek().is_none()
    }
}
