use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message headers keyed by lowercased name
///
/// Lookups are case-insensitive. A repeated header keeps the last value seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Record a header, replacing any earlier value under the same name
    pub fn insert(&mut self, name: &str, value: String) {
        self.0.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_lowercase()).map(String::as_str)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut String> {
        self.0.get_mut(&name.to_lowercase())
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Structured view of a stored message
///
/// Every field has a defined fallback, so a value of this type exists for any
/// input, however malformed:
/// - `subject` is `"No Subject"` when the header is missing or empty
/// - `from`, `to`, `cc`, `date` are empty strings when missing
/// - `is_html` is false unless the top-level or selected part says `text/html`
/// - `body` is the raw body block unless a multipart part was selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub headers: Headers,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub date: String,
    #[serde(rename = "isHtml")]
    pub is_html: bool,
    pub body: String,
}

impl ParsedMessage {
    /// Look up any header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}
