use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Folds a string for identity comparison: lowercased, decomposed with
/// diacritics dropped, trimmed, and with every whitespace run collapsed to a
/// single space.
pub fn normalize(value: &str) -> String {
    let folded: String = value
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Same as [`normalize`] but tolerates a missing value.
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize).unwrap_or_default()
}

/// Identity of a roster row that survives refetches with inconsistent
/// accents, casing or spacing in the source data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(name: &str, course: &str, university: &str, campus: &str) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            normalize(name),
            normalize(course),
            normalize(university),
            normalize(campus)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Slug used in export file names, e.g. `"São Carlos"` -> `"sao-carlos"`.
pub fn slug(value: &str) -> String {
    normalize(value).replace(' ', "-")
}
