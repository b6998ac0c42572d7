//! Tolerant, regex-based scanning of fetched markup.
//!
//! Nothing here builds a DOM: malformed or unbalanced markup is scanned as-is and never
//! produces an error.

pub mod meta;
pub mod text;

pub use meta::{extract_meta_tags, MetaKey, MetaMap};
pub use text::{html_to_text, preview, truncate_text, ELISION_MARKER, MAX_PROMPT_CHARS, PREVIEW_CHARS};
