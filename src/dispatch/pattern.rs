// src/dispatch/pattern.rs
//! Path pattern compiler
//!
//! Two grammars are supported:
//!
//! - glob: `*` matches exactly one path segment, `**` matches any number of
//!   segments, every other character is literal
//! - regex: a `re:` prefix followed by a regular expression body
//!
//! An unparsable pattern never matches (fails closed) and is logged, never
//! returned as an error.

use regex::Regex;
use tracing::warn;

const RE_PREFIX: &str = "re:";

// Sentinels survive regex::escape untouched, so wildcards inside mixed
// literal text still compile correctly.
const DOUBLE_STAR: &str = "\u{0}";
const SINGLE_STAR: &str = "\u{1}";

/// A compiled skip/mask path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    matcher: Regex,
}

impl PathPattern {
    /// Compile a pattern; `None` on any compilation failure
    pub fn compile(pattern: &str) -> Option<PathPattern> {
        let source = if let Some(body) = pattern.strip_prefix(RE_PREFIX) {
            if body.is_empty() {
                warn!("Ignoring pattern with empty regex body: {:?}", pattern);
                return None;
            }
            body.to_string()
        } else {
            glob_to_regex(pattern)
        };

        match Regex::new(&source) {
            Ok(matcher) => Some(PathPattern {
                raw: pattern.to_string(),
                matcher,
            }),
            Err(e) => {
                warn!("Ignoring unparsable pattern {:?}: {}", pattern, e);
                None
            }
        }
    }

    /// Compile a pattern list, dropping entries that fail to compile
    pub fn compile_all(patterns: &[String]) -> Vec<PathPattern> {
        patterns
            .iter()
            .filter_map(|p| PathPattern::compile(p))
            .collect()
    }

    /// The pattern text exactly as supplied by the caller
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the compiled matcher accepts the path
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// First pattern in caller-supplied order that accepts `path`
pub fn first_match<'a>(path: &str, patterns: &'a [PathPattern]) -> Option<&'a PathPattern> {
    patterns.iter().find(|p| p.matches(path))
}

/// Translate a glob pattern into an anchored regex source string
fn glob_to_regex(pattern: &str) -> String {
    // Tokenize wildcards before escaping the remaining text.
    let tokenized = pattern
        .replace("**", DOUBLE_STAR)
        .replace('*', SINGLE_STAR);
    let escaped = regex::escape(&tokenized);

    // `/**/` must also accept the zero-segment form, so the separators
    // around it collapse into the group.
    let body = escaped
        .replace(&format!("/{}/", DOUBLE_STAR), "/(?:.*/)?")
        .replace(&format!("/{}", DOUBLE_STAR), "(?:/.*)?")
        .replace(&format!("{}/", DOUBLE_STAR), "(?:.*/)?")
        .replace(DOUBLE_STAR, ".*")
        .replace(SINGLE_STAR, "[^/]+");

    format!("^{}$", body)
}
