//! Read-only view of the current location's query string.

use url::Url;

/// Decoded query parameters, in order, with `URLSearchParams` lookup rules:
/// repeated names resolve to their first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlQuery {
    pairs: Vec<(String, String)>,
}

impl UrlQuery {
    /// An empty query (no location, or a location without `?`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a raw query string, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url.query_pairs().into_owned().collect(),
        }
    }

    /// Accepts either an absolute URL or a bare query string.
    ///
    /// # Errors
    /// Returns an error if `input` looks like an absolute URL but fails to parse.
    pub fn from_location(input: &str) -> Result<Self, url::ParseError> {
        let input = input.trim();
        if input.contains("://") {
            return Url::parse(input).map(|url| Self::from_url(&url));
        }
        let query = input.split_once('?').map_or(input, |(_, q)| q);
        Ok(Self::parse(query))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    /// True when `name` is present with the exact value `true`.
    pub fn is_true(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    /// The value of `name` if present and non-empty.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
