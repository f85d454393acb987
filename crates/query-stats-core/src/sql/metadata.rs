// crates/query-stats-core/src/sql/metadata.rs
// ============================================================================
// Module: SQL Metadata Extraction
// Description: Table and column discovery over a tokenized SQL statement.
// Purpose: Report which objects a logged query touched without a full parse.
// Dependencies: sqlparser
// ============================================================================

//! ## Overview
//! [`TokenMetadataExtractor`] runs the `sqlparser` MySQL tokenizer over the raw
//! statement and walks the token stream with a small keyword-state machine:
//! names following `FROM`, any `JOIN`, `INTO`, `UPDATE` or `TABLE` are tables,
//! names following `SELECT`, `WHERE`, `ORDER BY`, `ON` or `SET` are columns.
//! `db.table` and `db.schema.table` notation is folded into one name, and
//! `alias.column` references are rewritten using `AS` aliases declared in
//! `FROM`/`JOIN` clauses.
//!
//! Invariants:
//! - Results are de-duplicated and keep first-seen order.
//! - Input the tokenizer rejects yields empty results, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::Token;
use sqlparser::tokenizer::Tokenizer;

// ============================================================================
// SECTION: Keyword Tables
// ============================================================================

/// Words treated as SQL keywords when unquoted.
const KEYWORDS: &[&str] = &[
    "ALL",
    "AND",
    "ANY",
    "AS",
    "ASC",
    "BETWEEN",
    "BY",
    "CASE",
    "CROSS",
    "DELAYED",
    "DELETE",
    "DESC",
    "DISTINCT",
    "DISTINCTROW",
    "DIV",
    "DUAL",
    "DUPLICATE",
    "ELSE",
    "END",
    "EXISTS",
    "FALSE",
    "FOR",
    "FORCE",
    "FROM",
    "FULL",
    "GROUP",
    "HAVING",
    "HIGH_PRIORITY",
    "IGNORE",
    "IN",
    "INDEX",
    "INNER",
    "INSERT",
    "INTERVAL",
    "INTO",
    "IS",
    "JOIN",
    "KEY",
    "LEFT",
    "LIKE",
    "LIMIT",
    "LOW_PRIORITY",
    "MOD",
    "NATURAL",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "OR",
    "ORDER",
    "OUTER",
    "REGEXP",
    "REPLACE",
    "RIGHT",
    "RLIKE",
    "SELECT",
    "SET",
    "SOME",
    "SQL_CALC_FOUND_ROWS",
    "SQL_NO_CACHE",
    "STRAIGHT_JOIN",
    "TABLE",
    "THEN",
    "TRUE",
    "UNION",
    "UNIQUE",
    "UPDATE",
    "USE",
    "USING",
    "VALUES",
    "WHEN",
    "WHERE",
    "WITH",
    "XOR",
];

/// Keywords that never change the column scanner's state.
const COLUMN_IGNORED_KEYWORDS: &[&str] = &[
    "AS", "AND", "OR", "XOR", "IN", "IS", "NULL", "NOT", "LIKE", "RLIKE", "REGEXP", "CASE",
    "WHEN", "DISTINCT", "UNIQUE", "BETWEEN", "ASC", "DESC", "EXISTS", "INTERVAL", "DIV", "MOD",
];

/// Keywords after which names are column references.
const COLUMN_KEYWORDS: &[&str] =
    &["SELECT", "WHERE", "ORDER BY", "ON", "SET", "ON DUPLICATE KEY UPDATE"];

/// Function names never reported as columns.
const IGNORED_FUNCTIONS: &[&str] =
    &["COUNT", "MIN", "MAX", "FROM_UNIXTIME", "DATE_FORMAT", "CAST", "CONVERT"];

/// Keywords that end a table list.
const TABLE_RESET_KEYWORDS: &[&str] = &["FORCE", "ORDER", "ORDER BY", "GROUP BY"];

/// Keywords that track table scanner state without introducing tables.
const TABLE_CLAUSE_KEYWORDS: &[&str] = &["WHERE", "ON", "VALUES", "SET"];

// ============================================================================
// SECTION: Public Types
// ============================================================================

/// Tables and columns referenced by a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Referenced tables in first-seen order.
    pub tables: Vec<String>,
    /// Referenced columns in first-seen order.
    pub columns: Vec<String>,
}

/// Pluggable table/column extractor.
pub trait SqlMetadata: Send + Sync {
    /// Extracts referenced tables and columns from raw SQL.
    ///
    /// Implementations recover from malformed input by returning empty sets.
    fn extract(&self, sql: &str) -> QueryMetadata;
}

/// Keyword-state extractor over the `sqlparser` MySQL token stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMetadataExtractor;

impl TokenMetadataExtractor {
    /// Returns the referenced tables.
    #[must_use]
    pub fn tables(&self, sql: &str) -> Vec<String> {
        tokenize(sql).map_or_else(Vec::new, |tokens| scan_tables(&lexemes(&tokens, ScanMode::Tables)))
    }

    /// Returns the referenced columns.
    #[must_use]
    pub fn columns(&self, sql: &str) -> Vec<String> {
        tokenize(sql)
            .map_or_else(Vec::new, |tokens| scan_columns(&lexemes(&tokens, ScanMode::Columns)))
    }
}

impl SqlMetadata for TokenMetadataExtractor {
    fn extract(&self, sql: &str) -> QueryMetadata {
        let Some(tokens) = tokenize(sql) else {
            return QueryMetadata::default();
        };
        QueryMetadata {
            tables: scan_tables(&lexemes(&tokens, ScanMode::Tables)),
            columns: scan_columns(&lexemes(&tokens, ScanMode::Columns)),
        }
    }
}

// ============================================================================
// SECTION: Lexemes
// ============================================================================

/// Which scanner the lexeme stream is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// Double-quoted strings are read as names.
    Tables,
    /// Double-quoted strings are literals.
    Columns,
}

/// Coarse token classes the scanners care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexemeKind {
    /// Unquoted keyword, possibly compound (`LEFT OUTER JOIN`).
    Keyword,
    /// Identifier, quoted or not.
    Name,
    /// `.`, `,`, `(`, `)` or `;`.
    Punctuation,
    /// `*`.
    Wildcard,
    /// Literals, operators and placeholders.
    Other,
}

/// Non-whitespace token reduced to its class and text.
#[derive(Debug, Clone)]
struct Lexeme {
    /// Token class.
    kind: LexemeKind,
    /// Text as written, without identifier quotes.
    text: String,
    /// ASCII upper-cased text.
    upper: String,
}

impl Lexeme {
    /// Builds a lexeme and caches its upper-cased text.
    fn new(kind: LexemeKind, text: String) -> Self {
        let upper = text.to_ascii_uppercase();
        Self {
            kind,
            text,
            upper,
        }
    }

    /// Converts a tokenizer token, dropping whitespace and comments.
    fn from_token(token: &Token, mode: ScanMode) -> Option<Self> {
        let lexeme = match token {
            Token::Whitespace(_) | Token::EOF => return None,
            Token::Word(word) => {
                let kind = if word.quote_style.is_none() && is_keyword(&word.value) {
                    LexemeKind::Keyword
                } else {
                    LexemeKind::Name
                };
                Self::new(kind, word.value.clone())
            }
            Token::DoubleQuotedString(value) if mode == ScanMode::Tables => {
                Self::new(LexemeKind::Name, value.clone())
            }
            Token::Period => Self::new(LexemeKind::Punctuation, ".".to_string()),
            Token::Comma => Self::new(LexemeKind::Punctuation, ",".to_string()),
            Token::LParen => Self::new(LexemeKind::Punctuation, "(".to_string()),
            Token::RParen => Self::new(LexemeKind::Punctuation, ")".to_string()),
            Token::SemiColon => Self::new(LexemeKind::Punctuation, ";".to_string()),
            Token::Mul => Self::new(LexemeKind::Wildcard, "*".to_string()),
            other => Self::new(LexemeKind::Other, other.to_string()),
        };
        Some(lexeme)
    }

    /// Returns true for a keyword with the given upper-case text.
    fn is_keyword(&self, upper: &str) -> bool {
        self.kind == LexemeKind::Keyword && self.upper == upper
    }

    /// Returns true for the given punctuation mark.
    fn is_punct(&self, mark: &str) -> bool {
        self.kind == LexemeKind::Punctuation && self.text == mark
    }

    /// Returns true for `.`.
    fn is_dot(&self) -> bool {
        self.is_punct(".")
    }
}

/// Returns true when an unquoted word is a keyword.
fn is_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    KEYWORDS.contains(&upper.as_str())
}

/// Runs the MySQL tokenizer, mapping failure to `None`.
fn tokenize(sql: &str) -> Option<Vec<Token>> {
    Tokenizer::new(&MySqlDialect {}, sql).tokenize().ok()
}

/// Builds the scanner input with compound keywords merged.
fn lexemes(tokens: &[Token], mode: ScanMode) -> Vec<Lexeme> {
    let single: Vec<Lexeme> =
        tokens.iter().filter_map(|token| Lexeme::from_token(token, mode)).collect();
    let mut merged = Vec::with_capacity(single.len());
    let mut index = 0;
    while let Some(window) = single.get(index ..) {
        let Some(first) = window.first() else {
            break;
        };
        let span = compound_span(window);
        if span > 1 {
            let text = window
                .iter()
                .take(span)
                .map(|lexeme| lexeme.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            merged.push(Lexeme::new(LexemeKind::Keyword, text));
        } else {
            merged.push(first.clone());
        }
        index += span;
    }
    merged
}

/// Returns how many lexemes at the window start form one keyword.
fn compound_span(window: &[Lexeme]) -> usize {
    let keyword_at =
        |offset: usize, upper: &str| window.get(offset).is_some_and(|lexeme| lexeme.is_keyword(upper));
    let Some(first) = window.first().filter(|lexeme| lexeme.kind == LexemeKind::Keyword) else {
        return 1;
    };
    match first.upper.as_str() {
        "ORDER" | "GROUP" if keyword_at(1, "BY") => 2,
        "INNER" | "LEFT" | "RIGHT" | "FULL" | "CROSS" | "NATURAL" => {
            if keyword_at(1, "JOIN") {
                2
            } else if keyword_at(1, "OUTER") && keyword_at(2, "JOIN") {
                3
            } else {
                1
            }
        }
        "ON" if keyword_at(1, "DUPLICATE") && keyword_at(2, "KEY") && keyword_at(3, "UPDATE") => 4,
        _ => 1,
    }
}

/// Removes duplicates while keeping first-seen order.
fn unique(items: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

// ============================================================================
// SECTION: Table Scanner
// ============================================================================

/// Returns true for keywords directly followed by a table name.
fn is_table_keyword(upper: &str) -> bool {
    matches!(upper, "FROM" | "INTO" | "UPDATE" | "TABLE" | "STRAIGHT_JOIN") || upper.ends_with("JOIN")
}

/// Collects table names.
fn scan_tables(lexemes: &[Lexeme]) -> Vec<String> {
    let mut tables = Vec::new();
    let mut last_keyword: Option<&str> = None;
    for (index, lexeme) in lexemes.iter().enumerate() {
        let keyword = lexeme.kind == LexemeKind::Keyword;
        if keyword
            && (is_table_keyword(&lexeme.upper)
                || TABLE_CLAUSE_KEYWORDS.contains(&lexeme.upper.as_str()))
        {
            last_keyword = Some(lexeme.upper.as_str());
        } else if lexeme.is_punct("(")
            || (keyword && TABLE_RESET_KEYWORDS.contains(&lexeme.upper.as_str()))
            || (lexeme.is_keyword("SELECT") && matches!(last_keyword, Some("INTO" | "TABLE")))
        {
            last_keyword = None;
        } else if (keyword || lexeme.kind == LexemeKind::Name)
            && let Some(current) = last_keyword
        {
            update_table_names(&mut tables, lexemes, index, current);
        }
    }
    unique(tables)
}

/// Applies one name or keyword to the table list.
fn update_table_names(tables: &mut Vec<String>, lexemes: &[Lexeme], index: usize, last_keyword: &str) {
    if !is_table_keyword(last_keyword) {
        return;
    }
    let Some(token) = lexemes.get(index) else {
        return;
    };
    let previous = index.checked_sub(1).and_then(|at| lexemes.get(at));
    let next = lexemes.get(index + 1);
    if previous.is_some_and(|lexeme| lexeme.is_keyword("AS"))
        || token.is_keyword("AS")
        || token.is_keyword("SELECT")
    {
        return;
    }

    if previous.is_some_and(Lexeme::is_dot)
        && !next.is_some_and(Lexeme::is_dot)
        && let Some(database) = index.checked_sub(2).and_then(|at| lexemes.get(at))
    {
        replace_last(tables, format!("{}.{}", database.text, token.text));
    }

    if let Some(qualified) = schema_notation(lexemes, index) {
        replace_last(tables, qualified);
    } else if previous
        .is_some_and(|lexeme| lexeme.is_punct(",") || lexeme.is_keyword(last_keyword))
    {
        tables.push(token.text.clone());
    }
}

/// Matches `name . name . name` ending at `index`.
fn schema_notation(lexemes: &[Lexeme], index: usize) -> Option<String> {
    let start = index.checked_sub(4)?;
    let window = lexemes.get(start ..= index)?;
    match window {
        [database, first_dot, schema, second_dot, table]
            if database.kind == LexemeKind::Name
                && first_dot.is_dot()
                && schema.kind == LexemeKind::Name
                && second_dot.is_dot()
                && table.kind == LexemeKind::Name =>
        {
            Some(format!("{}.{}.{}", database.text, schema.text, table.text))
        }
        _ => None,
    }
}

/// Replaces the most recent table, or records it when none exists.
fn replace_last(tables: &mut Vec<String>, name: String) {
    match tables.last_mut() {
        Some(last) => *last = name,
        None => tables.push(name),
    }
}

// ============================================================================
// SECTION: Column Scanner
// ============================================================================

/// Collects column names, resolving `alias.column` through table aliases.
fn scan_columns(lexemes: &[Lexeme]) -> Vec<String> {
    let aliases = table_aliases(lexemes);
    let mut columns: Vec<String> = Vec::new();
    let mut last_keyword: Option<&str> = None;
    let mut last: Option<&Lexeme> = None;
    for (index, lexeme) in lexemes.iter().enumerate() {
        let after_dot = last.is_some_and(Lexeme::is_dot);
        match lexeme.kind {
            LexemeKind::Keyword => {
                if !COLUMN_IGNORED_KEYWORDS.contains(&lexeme.upper.as_str()) {
                    last_keyword = Some(lexeme.upper.as_str());
                }
            }
            LexemeKind::Name => {
                let in_column_clause =
                    last_keyword.is_some_and(|keyword| COLUMN_KEYWORDS.contains(&keyword));
                if in_column_clause && !last.is_some_and(|token| token.is_keyword("AS")) {
                    let function_call = lexemes.get(index + 1).is_some_and(|next| next.is_punct("("));
                    if !function_call && !IGNORED_FUNCTIONS.contains(&lexeme.upper.as_str()) {
                        if after_dot {
                            qualify_last(&mut columns, &aliases, &lexeme.text);
                        } else {
                            columns.push(lexeme.text.clone());
                        }
                    }
                } else if last_keyword == Some("INTO")
                    && last.is_some_and(|token| token.is_punct("(") || token.is_punct(","))
                {
                    columns.push(lexeme.text.clone());
                }
            }
            LexemeKind::Wildcard => {
                if last_keyword == Some("SELECT") && !last.is_some_and(|token| token.is_punct("(")) {
                    if after_dot {
                        qualify_last(&mut columns, &aliases, &lexeme.text);
                    } else {
                        columns.push(lexeme.text.clone());
                    }
                }
            }
            LexemeKind::Punctuation | LexemeKind::Other => {}
        }
        last = Some(lexeme);
    }
    unique(columns)
}

/// Rewrites the last column as `table.suffix`, resolving an alias first.
fn qualify_last(columns: &mut Vec<String>, aliases: &HashMap<String, String>, suffix: &str) {
    match columns.last_mut() {
        Some(last) => {
            let table = aliases.get(last.as_str()).map_or(last.as_str(), String::as_str);
            *last = format!("{table}.{suffix}");
        }
        None => columns.push(suffix.to_string()),
    }
}

/// Maps `AS` aliases declared after `FROM`/`JOIN` to their table names.
fn table_aliases(lexemes: &[Lexeme]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    let mut last_keyword: Option<&Lexeme> = None;
    let mut last_table: Option<String> = None;
    for (index, lexeme) in lexemes.iter().enumerate() {
        if let Some(keyword) = last_keyword {
            if keyword.upper == "FROM" || keyword.upper.ends_with("JOIN") {
                last_table = (lexeme.kind == LexemeKind::Name).then(|| qualified_name(lexemes, index));
            } else if keyword.upper == "AS"
                && let Some(table) = last_table.take()
            {
                aliases.insert(lexeme.text.clone(), table);
            }
        }
        last_keyword = (lexeme.kind == LexemeKind::Keyword).then_some(lexeme);
    }
    aliases
}

/// Joins a dotted name starting at `index`.
fn qualified_name(lexemes: &[Lexeme], index: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut cursor = index;
    while let Some(part) = lexemes.get(cursor).filter(|lexeme| lexeme.kind == LexemeKind::Name) {
        parts.push(part.text.as_str());
        let continues = lexemes.get(cursor + 1).is_some_and(Lexeme::is_dot)
            && lexemes.get(cursor + 2).is_some_and(|lexeme| lexeme.kind == LexemeKind::Name);
        if !continues {
            break;
        }
        cursor += 2;
    }
    parts.join(".")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::QueryMetadata;
    use super::SqlMetadata;
    use super::TokenMetadataExtractor;

    fn extract(sql: &str) -> QueryMetadata {
        TokenMetadataExtractor.extract(sql)
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn select_with_where() {
        let metadata = extract("SELECT * FROM users WHERE id = '5'");
        assert_eq!(metadata.tables, names(&["users"]));
        assert_eq!(metadata.columns, names(&["*", "id"]));
    }

    #[test]
    fn join_aliases_resolve_to_tables() {
        let metadata = extract(
            "SELECT a.name, b.total FROM users AS a LEFT JOIN orders AS b ON a.id = b.user_id",
        );
        assert_eq!(metadata.tables, names(&["users", "orders"]));
        assert_eq!(
            metadata.columns,
            names(&["users.name", "orders.total", "users.id", "orders.user_id"])
        );
    }

    #[test]
    fn insert_with_quoted_database_and_columns() {
        let metadata = extract("INSERT INTO `stats`.`events` (`id`, name) VALUES (?, ?)");
        assert_eq!(metadata.tables, names(&["stats.events"]));
        assert_eq!(metadata.columns, names(&["id", "name"]));
    }

    #[test]
    fn insert_on_duplicate_key_update() {
        let metadata = extract(
            "INSERT INTO counters (name, hits) VALUES (?, ?) ON DUPLICATE KEY UPDATE hits = hits + 1",
        );
        assert_eq!(metadata.tables, names(&["counters"]));
        assert_eq!(metadata.columns, names(&["name", "hits"]));
    }

    #[test]
    fn update_reports_target_and_assigned_columns() {
        let metadata = extract("UPDATE accounts SET balance = balance + 1 WHERE id = ?");
        assert_eq!(metadata.tables, names(&["accounts"]));
        assert_eq!(metadata.columns, names(&["balance", "id"]));
    }

    #[test]
    fn delete_reports_table() {
        let metadata = extract("DELETE FROM sessions WHERE expires_at < ?");
        assert_eq!(metadata.tables, names(&["sessions"]));
        assert_eq!(metadata.columns, names(&["expires_at"]));
    }

    #[test]
    fn subquery_tables_are_collected() {
        let metadata = extract("SELECT name FROM users WHERE id IN (SELECT user_id FROM orders)");
        assert_eq!(metadata.tables, names(&["users", "orders"]));
        assert_eq!(metadata.columns, names(&["name", "id", "user_id"]));
    }

    #[test]
    fn schema_qualified_table() {
        let metadata = extract("SELECT * FROM db.sch.tbl");
        assert_eq!(metadata.tables, names(&["db.sch.tbl"]));
    }

    #[test]
    fn double_quoted_table_name() {
        let metadata = extract("SELECT id FROM \"users\"");
        assert_eq!(metadata.tables, names(&["users"]));
        assert_eq!(metadata.columns, names(&["id"]));
    }

    #[test]
    fn aggregate_functions_are_not_columns() {
        let metadata = extract("SELECT COUNT(*), MAX(score) FROM games GROUP BY player");
        assert_eq!(metadata.tables, names(&["games"]));
        assert_eq!(metadata.columns, names(&["score"]));
    }

    #[test]
    fn comma_separated_tables_and_force_index() {
        let metadata = extract("SELECT a FROM t1, t2 FORCE INDEX (idx) WHERE t1.x = t2.y");
        assert_eq!(metadata.tables, names(&["t1", "t2"]));
        assert_eq!(metadata.columns, names(&["a", "t1.x", "t2.y"]));
    }

    #[test]
    fn untokenizable_input_yields_empty_sets() {
        assert_eq!(extract("SELECT 'unterminated"), QueryMetadata::default());
        let extractor = TokenMetadataExtractor;
        assert!(extractor.tables("SELECT 'unterminated").is_empty());
        assert!(extractor.columns("").is_empty());
    }
}
