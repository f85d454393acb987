// crates/query-stats-core/src/sql/normalize.rs
// ============================================================================
// Module: SQL Normalizer
// Description: Comment stripping and literal masking for SQL text.
// Purpose: Produce a parameterized statement suitable as an aggregation key.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Normalization runs two passes in order:
//! 1. remove `--` and `#` comments to end of line and `/* ... */` blocks, then
//!    trim surrounding whitespace;
//! 2. replace every single-quoted literal, every escaped fragment ending in a
//!    quote, and every digit run with `?`.
//!
//! Both passes repeat until nothing changes, so text such as `-/**/- x` cannot
//! leave a fresh comment behind, `\\''` cannot leave a fresh escaped fragment
//! behind, and the whole operation stays idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Line comments (`--`, `#`) up to end of line, and block comments.
const COMMENT_PATTERN: &str = r"(?ms)(--|#).*?$|/\*.*?\*/";
/// Quoted literals, escaped fragments closed by a quote, and digit runs.
const LITERAL_PATTERN: &str = r"'[^']*'|\\[^\\']*'|\d+";

/// Compiled comment matcher.
static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
/// Compiled literal matcher.
static LITERAL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Returns the compiled comment matcher.
#[allow(clippy::expect_used, reason = "Pattern is a compile-time constant.")]
fn comment_regex() -> &'static Regex {
    COMMENT_REGEX.get_or_init(|| Regex::new(COMMENT_PATTERN).expect("comment pattern compiles"))
}

/// Returns the compiled literal matcher.
#[allow(clippy::expect_used, reason = "Pattern is a compile-time constant.")]
fn literal_regex() -> &'static Regex {
    LITERAL_REGEX.get_or_init(|| Regex::new(LITERAL_PATTERN).expect("literal pattern compiles"))
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Strips comments and masks literals.
///
/// Never fails; empty input yields an empty string.
#[must_use]
pub fn normalize(sql: &str) -> String {
    mask_literals(&strip_comments(sql))
}

/// Removes SQL comments and trims surrounding whitespace.
#[must_use]
pub fn strip_comments(sql: &str) -> String {
    let mut current = sql.to_string();
    loop {
        let stripped = match comment_regex().replace_all(&current, "") {
            Cow::Borrowed(_) => break,
            Cow::Owned(value) => value,
        };
        current = stripped;
    }
    current.trim().to_string()
}

/// Replaces quoted literals and digit runs with `?`.
///
/// Repeats until no match remains, since masking an escaped fragment can
/// leave a new `\?'` fragment behind.
#[must_use]
pub fn mask_literals(sql: &str) -> String {
    let mut current = sql.to_string();
    loop {
        let masked = match literal_regex().replace_all(&current, "?") {
            Cow::Borrowed(_) => break,
            Cow::Owned(value) => value,
        };
        current = masked;
    }
    current
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::mask_literals;
    use super::normalize;
    use super::strip_comments;

    #[test]
    fn masks_quoted_values_and_numbers() {
        assert_eq!(
            normalize("SELECT * FROM users WHERE id = '5'"),
            "SELECT * FROM users WHERE id = ?"
        );
        assert_eq!(normalize("SELECT a FROM t LIMIT 10, 20"), "SELECT a FROM t LIMIT ?, ?");
        assert_eq!(normalize("SELECT * FROM t1 WHERE name = 'o'"), "SELECT * FROM t? WHERE name = ?");
    }

    #[test]
    fn strips_line_and_block_comments() {
        assert_eq!(strip_comments("SELECT 1 -- trailing"), "SELECT 1");
        assert_eq!(strip_comments("# header\nSELECT a FROM t"), "SELECT a FROM t");
        assert_eq!(strip_comments("/* multi\nline */ SELECT a FROM t"), "SELECT a FROM t");
        assert_eq!(strip_comments("SELECT /* x */a FROM t"), "SELECT a FROM t");
    }

    #[test]
    fn comments_are_removed_before_masking() {
        assert_eq!(normalize("/* 42 */ SELECT name FROM t WHERE id=7"), "SELECT name FROM t WHERE id=?");
    }

    #[test]
    fn escaped_fragment_is_masked() {
        assert_eq!(mask_literals(r"WHERE a = \x'"), "WHERE a = ?");
    }

    #[test]
    fn fragment_revealed_by_masking_is_also_masked() {
        let sql = r"\\''";
        let once = normalize(sql);
        assert_eq!(once, "?");
        assert_eq!(normalize(&once), once);
        assert_eq!(mask_literals(r"WHERE a = \\'' AND b = 1"), "WHERE a = ? AND b = ?");
    }

    #[test]
    fn comment_revealed_by_stripping_is_also_removed() {
        assert_eq!(strip_comments("SELECT a -/**/- hidden"), "SELECT a");
        let once = normalize("SELECT a -/**/- hidden");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }
}
