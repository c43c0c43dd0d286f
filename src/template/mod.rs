//! Static notification templates.
//!
//! Maps (event type, language) to subject/body text with `{{variable}}`
//! placeholders filled from the submission context. The catalog covers
//! English, Amharic and Afaan Oromo; English is the deterministic
//! fallback for anything else.

mod catalog;
mod substitution;
mod types;

pub use catalog::{render, required_keys};
pub use types::{Language, RenderedMessage, TemplateError, TemplateResult};
