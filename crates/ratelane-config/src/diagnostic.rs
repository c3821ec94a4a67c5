// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of configuration failures as miette diagnostics.
//!
//! Figment reports what went wrong but not where; this module maps each
//! figment error back onto the TOML text it came from and, for misspelled
//! keys, proposes the closest known key.

#![allow(unused_assignments)] // emitted by the miette derive

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Keys scoring below this Jaro-Winkler similarity are not offered as fixes.
const MIN_SIMILARITY: f64 = 0.75;

/// A problem found while loading `ratelane.toml` or `RATELANE_*` overrides.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(ratelane::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest known key, when one is similar enough.
        suggestion: Option<String>,
        /// Comma separated keys accepted by the enclosing section.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(ratelane::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `server.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(ratelane::config::missing_key),
        help("set `{key}` in ratelane.toml")
    )]
    MissingKey { key: String },

    /// A value parsed fine but is unusable (zero concurrency, bad URL, ...).
    #[error("validation error: {message}")]
    #[diagnostic(code(ratelane::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(ratelane::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(key) => format!("did you mean `{key}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Splits a figment error chain into one diagnostic per failure.
///
/// `toml_sources` holds `(path, content)` pairs for every file (or inline
/// string) that was merged, so spans can be resolved.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &FigmentError, toml_sources: &[(String, String)]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = span_in_source(error, &error.path, field, toml_sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: field.to_string(),
        },
        Kind::InvalidType(actual, expected) => {
            let (span, src) = error
                .path
                .split_last()
                .map(|(field, section)| span_in_source(error, section, field, toml_sources))
                .unwrap_or((None, None));
            ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Picks the merged source the error originated from and locates `field` in it.
fn span_in_source(
    error: &FigmentError,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|meta| meta.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings have no file metadata; use the only source if there is one.
    let matched = match origin {
        Some(origin) => toml_sources.iter().find(|(path, _)| *path == origin),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    matched
        .and_then(|(path, content)| {
            find_key_offset(content, section, field).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), field.len())),
                    Some(NamedSource::new(path, content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` inside the table named by `path[0]`.
///
/// An empty `path` searches from the top of the document. Only the first
/// path segment is matched against a `[table]` header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(table) => {
            let header = format!("[{table}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        let is_key = rest
            .strip_prefix(field)
            .and_then(|after| after.chars().next())
            .is_some_and(|c| c == '=' || c == ' ' || c == '\t');
        if is_key {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Best-scoring key from `valid_keys`, if any clears [`MIN_SIMILARITY`].
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints every error to stderr, falling back to plain text if rendering fails.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_concurrency_for_typo() {
        let valid = &["concurrency", "poll_interval_ms", "max_attempts"];
        assert_eq!(
            suggest_key("concurency", valid),
            Some("concurrency".to_string())
        );
    }

    #[test]
    fn suggests_base_url_for_transposition() {
        let valid = &["base_url", "timeout_secs", "default_azure_api_version"];
        assert_eq!(suggest_key("base_rul", valid), Some("base_url".to_string()));
    }

    #[test]
    fn nothing_close_enough() {
        let valid = &["host", "port", "bearer_token"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn locates_key_within_table() {
        let content = "[server]\nport = 80\n[worker]\nconcurency = 2\n";
        let path = vec!["worker".to_string()];
        let o = find_key_offset(content, &path, "concurency").unwrap();
        assert_eq!(&content[o..o + 10], "concurency");
    }

    #[test]
    fn locates_indented_top_level_key() {
        let content = "  log_level= \"info\"\n";
        let o = find_key_offset(content, &[], "log_level").unwrap();
        assert_eq!(o, 2);
    }

    #[test]
    fn missing_table_yields_none() {
        let content = "[server]\nport = 80\n";
        let path = vec!["worker".to_string()];
        assert!(find_key_offset(content, &path, "port").is_none());
    }

    #[test]
    fn prefix_of_longer_key_is_not_a_match() {
        let content = "[worker]\nmax_attempts_total = 1\n";
        let path = vec!["worker".to_string()];
        assert!(find_key_offset(content, &path, "max_attempts").is_none());
    }
}
