//! Template types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::EventType;

/// Template-specific error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing context key {key:?} for event type {event_type}")]
    MissingContextKey {
        event_type: EventType,
        key: &'static str,
    },

    #[error("Context must be a JSON object")]
    ContextNotObject,
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Languages the catalog carries translations for
///
/// English is the baseline: an unknown or absent preference resolves to
/// it deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English (baseline)
    #[default]
    En,
    /// Amharic
    Am,
    /// Afaan Oromo
    Om,
}

impl Language {
    /// ISO 639-1 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Am => "am",
            Language::Om => "om",
        }
    }

    /// Resolve a directory-provided language code, falling back to English
    /// when the code is absent or not in the catalog.
    pub fn resolve(code: Option<&str>) -> Self {
        match code {
            Some("en") => Language::En,
            Some("am") => Language::Am,
            Some("om") => Language::Om,
            _ => Language::En,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject and body text produced by a catalog render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_codes() {
        assert_eq!(Language::resolve(Some("en")), Language::En);
        assert_eq!(Language::resolve(Some("am")), Language::Am);
        assert_eq!(Language::resolve(Some("om")), Language::Om);
    }

    #[test]
    fn test_resolve_falls_back_to_english() {
        assert_eq!(Language::resolve(None), Language::En);
        assert_eq!(Language::resolve(Some("fr")), Language::En);
        assert_eq!(Language::resolve(Some("")), Language::En);
        assert_eq!(Language::resolve(Some("EN")), Language::En);
    }
}
