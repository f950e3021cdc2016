//! Text normalization
//!
//! Turkish case folding, tokenization, abbreviation expansion and spelling
//! correction. Everything here is a pure function of the input and the
//! [`TextTables`] snapshot it is given.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::InputError;
use crate::tables::TextTables;

/// Lowercase using Turkish rules: `I` folds to `ı` and `İ` to `i`.
///
/// The generic Unicode mapping turns `İ` into `i` followed by a combining
/// dot, which would split tokens later on.
pub fn turkish_lowercase(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

fn turkish_uppercase_char(c: char, out: &mut String) {
    match c {
        'i' => out.push('İ'),
        'ı' => out.push('I'),
        _ => out.extend(c.to_uppercase()),
    }
}

/// Capitalize the first letter of every word using Turkish rules
pub fn turkish_title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            turkish_uppercase_char(c, &mut out);
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip Turkish diacritics (`ç ğ ı ö ş ü â î û`), leaving other characters
pub fn ascii_fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ç' => 'c',
            'ğ' => 'g',
            'ı' => 'i',
            'ö' => 'o',
            'ş' => 's',
            'ü' => 'u',
            'â' => 'a',
            'î' => 'i',
            'û' => 'u',
            'Ç' => 'C',
            'Ğ' => 'G',
            'İ' => 'I',
            'Ö' => 'O',
            'Ş' => 'S',
            'Ü' => 'U',
            'Â' => 'A',
            'Î' => 'I',
            'Û' => 'U',
            other => other,
        })
        .collect()
}

/// Comparison key for names: Turkish-lowercased, ASCII-folded, single-spaced
pub fn fold_key(s: &str) -> String {
    let folded = ascii_fold(&turkish_lowercase(s));
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A whole-token rewrite applied during normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRewrite {
    pub position: usize,
    pub from: String,
    pub to: String,
}

/// Output of [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// Case-folded text with abbreviations expanded
    pub normalized: String,
    /// Normalized text with misspellings replaced by canonical spellings
    pub corrected: String,
    pub expansions: Vec<TokenRewrite>,
    pub corrections: Vec<TokenRewrite>,
}

impl NormalizedText {
    pub fn corrected_tokens(&self) -> impl Iterator<Item = &str> {
        self.corrected.split(' ')
    }
}

/// Split folded text into tokens.
///
/// Punctuation separates tokens, except `/` and `-` between two digits
/// (`10/3` stays one token). A Turkish case suffix after an apostrophe is
/// dropped (`kadıköy'de` → `kadıköy`). Combining marks left over after NFC
/// composition are discarded.
fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().filter(|c| !is_combining_mark(*c)).collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_suffix = false;

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            if !in_suffix {
                current.push(c);
            }
            continue;
        }

        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next = chars.get(i + 1).copied();
        if (c == '/' || c == '-') && prev_digit && next.is_some_and(|n| n.is_ascii_digit()) {
            if !in_suffix {
                current.push(c);
            }
            continue;
        }
        if (c == '\'' || c == '’') && !current.is_empty() && next.is_some_and(char::is_alphabetic) {
            in_suffix = true;
            continue;
        }

        in_suffix = false;
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Normalize raw address text.
///
/// Fails only when the input has nothing to work with; every other oddity is
/// carried through to the parser.
pub fn normalize(raw: &str, tables: &TextTables) -> Result<NormalizedText, InputError> {
    if raw.trim().is_empty() {
        return Err(InputError::Empty);
    }

    let composed: String = raw.nfc().collect();
    let folded = turkish_lowercase(&composed);
    let mut tokens = tokenize(&folded);
    if tokens.is_empty() {
        return Err(InputError::NoContent);
    }

    let mut expansions = Vec::new();
    for (position, token) in tokens.iter_mut().enumerate() {
        if let Some(expansion) = tables.expand(token) {
            if expansion != token.as_str() {
                expansions.push(TokenRewrite {
                    position,
                    from: token.clone(),
                    to: expansion.to_string(),
                });
                *token = expansion.to_string();
            }
        }
    }
    let normalized = tokens.join(" ");

    let mut corrections = Vec::new();
    for (position, token) in tokens.iter_mut().enumerate() {
        if let Some(canonical) = tables.correct(token) {
            if canonical != token.as_str() {
                corrections.push(TokenRewrite {
                    position,
                    from: token.clone(),
                    to: canonical.to_string(),
                });
                *token = canonical.to_string();
            }
        }
    }
    let corrected = tokens.join(" ");

    Ok(NormalizedText {
        normalized,
        corrected,
        expansions,
        corrections,
    })
}
