//! Glob pattern matching for overlay rules.
//!
//! Patterns use filesystem glob semantics: `*` and `?` stay within a single
//! path segment, `**` crosses segments. A pattern is anchored to the whole
//! relative path it is matched against, never a substring of it.

use globset::{GlobBuilder, GlobMatcher};

/// Errors for pattern compilation
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// A compiled glob pattern with a specificity score.
///
/// Paths and patterns may be written with or without a leading `/`; both
/// sides are normalized before matching.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    matcher: GlobMatcher,
    specificity: usize,
}

impl PathPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let normalized = pattern.trim_start_matches('/');
        let glob = GlobBuilder::new(normalized)
            .literal_separator(true)
            .build()
            .map_err(|source| PatternError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            raw: pattern.to_string(),
            matcher: glob.compile_matcher(),
            specificity: literal_char_count(normalized),
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match against a relative path (single `/` separator, no trailing
    /// separator).
    pub fn matches(&self, relative_path: &str) -> bool {
        self.matcher.is_match(relative_path.trim_start_matches('/'))
    }

    /// Count of literal (non-wildcard) characters in the pattern.
    ///
    /// Higher means more specific. Rule precedence is positional
    /// (declaration depth, then list order); this score is the designated
    /// tie-breaker should a rule source without a total order ever appear.
    pub fn specificity(&self) -> usize {
        self.specificity
    }
}

fn literal_char_count(pattern: &str) -> usize {
    pattern
        .chars()
        .filter(|c| !matches!(c, '*' | '?' | '[' | ']' | '{' | '}'))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_stays_in_segment() {
        let pattern = PathPattern::new("*").unwrap();
        assert!(pattern.matches("c.txt"));
        assert!(!pattern.matches("b/c.txt"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let pattern = PathPattern::new("**").unwrap();
        assert!(pattern.matches("c.txt"));
        assert!(pattern.matches("b/c.txt"));
    }

    #[test]
    fn test_literal_segments_match_exactly() {
        let pattern = PathPattern::new("etc/hosts").unwrap();
        assert!(pattern.matches("etc/hosts"));
        assert!(!pattern.matches("etc/hosts.bak"));
        assert!(!pattern.matches("usr/etc/hosts"));
    }

    #[test]
    fn test_anchored_to_full_path() {
        let pattern = PathPattern::new("*.conf").unwrap();
        assert!(pattern.matches("app.conf"));
        assert!(!pattern.matches("etc/app.conf"));
    }

    #[test]
    fn test_segment_glob_in_subdirectory() {
        let pattern = PathPattern::new("etc/*.conf").unwrap();
        assert!(pattern.matches("etc/app.conf"));
        assert!(!pattern.matches("etc/sub/app.conf"));
    }

    #[test]
    fn test_leading_slash_is_ignored_on_both_sides() {
        let pattern = PathPattern::new("/etc/*.conf").unwrap();
        assert!(pattern.matches("etc/app.conf"));
        assert!(pattern.matches("/etc/app.conf"));
    }

    #[test]
    fn test_specificity_counts_literals() {
        let wild = PathPattern::new("*").unwrap();
        let suffix = PathPattern::new("*.conf").unwrap();
        let exact = PathPattern::new("etc/app.conf").unwrap();
        assert_eq!(wild.specificity(), 0);
        assert_eq!(suffix.specificity(), 5);
        assert_eq!(exact.specificity(), 12);
        assert!(exact.specificity() > suffix.specificity());
        assert!(suffix.specificity() > wild.specificity());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PathPattern::new("a[").unwrap_err();
        assert!(matches!(err, PatternError::InvalidGlob { .. }));
        assert!(err.to_string().contains("a["));
    }

    #[test]
    fn test_raw_pattern_preserved() {
        let pattern = PathPattern::new("/etc/*").unwrap();
        assert_eq!(pattern.as_str(), "/etc/*");
    }
}
