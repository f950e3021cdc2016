//! Lookup tables for Turkish address text
//!
//! Abbreviation and correction keys are stored ASCII-folded so that a token
//! typed without diacritics (or upper-cased on a non-Turkish keyboard) still
//! matches. Matching is always whole-token; nothing here is applied to
//! substrings.

use ahash::AHashMap;

use crate::text::{ascii_fold, turkish_lowercase};

/// Suffix that marks the preceding tokens as a neighborhood name
pub const NEIGHBORHOOD_SUFFIX: &str = "mahallesi";

/// Suffixes that mark the preceding tokens as a street name
pub const STREET_SUFFIXES: &[&str] = &["sokak", "caddesi", "bulvarı", "yolu", "çıkmazı"];

/// Suffixes that mark the preceding tokens as a landmark or point of interest
pub const LANDMARK_SUFFIXES: &[&str] = &[
    "apartmanı",
    "sitesi",
    "hastanesi",
    "okulu",
    "lisesi",
    "camii",
    "parkı",
    "plaza",
    "avm",
    "çarşısı",
    "meydanı",
    "iskelesi",
    "istasyonu",
    "üniversitesi",
    "karakolu",
    "postanesi",
    "oteli",
    "kulesi",
];

pub const BUILDING_MARKER: &str = "no";
pub const FLOOR_MARKER: &str = "kat";
pub const UNIT_MARKER: &str = "daire";

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("mah", "mahallesi"),
    ("mh", "mahallesi"),
    ("mahl", "mahallesi"),
    ("mahalle", "mahallesi"),
    ("mahallesi", "mahallesi"),
    ("sk", "sokak"),
    ("sok", "sokak"),
    ("sokak", "sokak"),
    ("sokagi", "sokak"),
    ("cd", "caddesi"),
    ("cad", "caddesi"),
    ("cadd", "caddesi"),
    ("cadde", "caddesi"),
    ("caddesi", "caddesi"),
    ("bulv", "bulvarı"),
    ("blv", "bulvarı"),
    ("bul", "bulvarı"),
    ("bulvar", "bulvarı"),
    ("bulvari", "bulvarı"),
    ("cikmazi", "çıkmazı"),
    ("apt", "apartmanı"),
    ("ap", "apartmanı"),
    ("apartman", "apartmanı"),
    ("apartmani", "apartmanı"),
    ("sit", "sitesi"),
    ("no", "no"),
    ("nu", "no"),
    ("nr", "no"),
    ("numara", "no"),
    ("k", "kat"),
    ("kat", "kat"),
    ("d", "daire"),
    ("dai", "daire"),
    ("daire", "daire"),
];

/// Frequent ASCII transliterations of street and landmark words that are not
/// part of the administrative hierarchy.
const COMMON_CORRECTIONS: &[(&str, &str)] = &[
    ("caferaga", "caferağa"),
    ("bagdat", "bağdat"),
    ("ataturk", "atatürk"),
    ("inonu", "inönü"),
    ("istiklal", "istiklal"),
    ("cumhuriyet", "cumhuriyet"),
    ("sehit", "şehit"),
    ("kopru", "köprü"),
    ("cesme", "çeşme"),
    ("carsi", "çarşı"),
    ("carsisi", "çarşısı"),
    ("meydani", "meydanı"),
    ("parki", "parkı"),
    ("iskelesi", "iskelesi"),
    ("universitesi", "üniversitesi"),
    ("gul", "gül"),
    ("cicek", "çiçek"),
    ("sogut", "söğüt"),
    ("yildiz", "yıldız"),
    ("bahce", "bahçe"),
];

/// Abbreviation and misspelling tables used by the normalizer
#[derive(Debug, Clone, Default)]
pub struct TextTables {
    abbreviations: AHashMap<String, String>,
    corrections: AHashMap<String, String>,
}

impl TextTables {
    /// Tables with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in Turkish abbreviation and correction tables
    pub fn turkish() -> Self {
        let mut tables = Self::empty();
        for (abbr, expansion) in ABBREVIATIONS {
            tables.add_abbreviation(abbr, expansion);
        }
        for (from, to) in COMMON_CORRECTIONS {
            tables.add_correction(from, to);
        }
        tables
    }

    pub fn add_abbreviation(&mut self, abbreviation: &str, expansion: &str) {
        self.abbreviations.insert(
            ascii_fold(&turkish_lowercase(abbreviation)),
            turkish_lowercase(expansion),
        );
    }

    pub fn add_correction(&mut self, from: &str, to: &str) {
        self.corrections
            .insert(ascii_fold(&turkish_lowercase(from)), turkish_lowercase(to));
    }

    /// Add correction entries derived from canonical names (usually the
    /// hierarchy's). Each name token gets an entry keyed by its ASCII fold,
    /// so both "kadikoy" and "KADIKÖY" come back as "kadıköy". Folds shared by two different spellings are skipped,
    /// and existing entries are never overridden. Returns the number added.
    pub fn extend_with_names<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        let mut derived: AHashMap<String, Option<String>> = AHashMap::new();
        for name in names {
            for token in turkish_lowercase(name).split_whitespace() {
                let key = ascii_fold(token);
                derived
                    .entry(key)
                    .and_modify(|existing| {
                        if existing.as_deref() != Some(token) {
                            *existing = None;
                        }
                    })
                    .or_insert_with(|| Some(token.to_string()));
            }
        }

        let mut added = 0;
        for (key, canonical) in derived {
            if let Some(canonical) = canonical {
                if !self.corrections.contains_key(&key) {
                    self.corrections.insert(key, canonical);
                    added += 1;
                }
            }
        }
        added
    }

    /// Expansion for an abbreviation token, matched on the whole token
    pub fn expand(&self, token: &str) -> Option<&str> {
        self.abbreviations
            .get(token)
            .or_else(|| self.abbreviations.get(&ascii_fold(token)))
            .map(String::as_str)
    }

    /// Canonical spelling for a misspelled token, matched on the whole token
    pub fn correct(&self, token: &str) -> Option<&str> {
        self.corrections
            .get(token)
            .or_else(|| self.corrections.get(&ascii_fold(token)))
            .map(String::as_str)
    }

    pub fn abbreviation_count(&self) -> usize {
        self.abbreviations.len()
    }

    pub fn correction_count(&self) -> usize {
        self.corrections.len()
    }
}

/// Whether a token is one of the structural words the parser keys on
pub fn is_structural_token(token: &str) -> bool {
    token == NEIGHBORHOOD_SUFFIX
        || token == BUILDING_MARKER
        || token == FLOOR_MARKER
        || token == UNIT_MARKER
        || STREET_SUFFIXES.contains(&token)
        || LANDMARK_SUFFIXES.contains(&token)
}
