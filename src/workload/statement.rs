use std::path::Path;

use crate::error::Result;

pub const SELECT_KEYWORD: &str = "select";
pub const EXPLAIN_KEYWORD: &str = "explain";
pub const COMMENT_PREFIX: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Data retrieval or plan inspection; measured and eligible for training
    Workload,
    /// Session or configuration command; executed verbatim, never measured
    Meta,
}

pub fn classify(raw: &str) -> StatementKind {
    let normalized = raw.trim().to_lowercase();
    if normalized.starts_with(SELECT_KEYWORD) || normalized.starts_with(EXPLAIN_KEYWORD) {
        StatementKind::Workload
    } else {
        StatementKind::Meta
    }
}

/// Strip everything in front of the first `select` of a workload statement,
/// e.g. an `EXPLAIN ANALYZE` wrapper. Meta statements come back unchanged.
pub fn canonicalize(raw: &str) -> &str {
    if classify(raw) != StatementKind::Workload {
        return raw;
    }
    match find_ignore_ascii_case(raw, SELECT_KEYWORD) {
        Some(idx) => &raw[idx..],
        None => raw,
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// A single line of a workload file, classified once on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    text: String,
    kind: StatementKind,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Self { text, kind }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn is_workload(&self) -> bool {
        self.kind == StatementKind::Workload
    }

    pub fn canonical(&self) -> &str {
        canonicalize(&self.text)
    }
}

/// Split workload file contents into statements, one per line.
/// Comment lines and blank lines are dropped.
pub fn parse_statements(contents: &str) -> Vec<Statement> {
    contents
        .lines()
        .filter(|line| !line.starts_with(COMMENT_PREFIX))
        .filter(|line| !line.trim().is_empty())
        .map(Statement::new)
        .collect()
}

pub fn read_statements(path: &Path) -> Result<Vec<Statement>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_statements(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_workload() {
        assert_eq!(classify("SELECT * FROM title"), StatementKind::Workload);
        assert_eq!(classify("select count(*) from t;"), StatementKind::Workload);
        assert_eq!(classify("  Explain analyze select 1"), StatementKind::Workload);
        assert_eq!(classify("EXPLAIN (ANALYZE, FORMAT JSON) SELECT 1"), StatementKind::Workload);
    }

    #[test]
    fn test_classify_meta() {
        assert_eq!(classify("SET enable_nestloop TO off;"), StatementKind::Meta);
        assert_eq!(classify("LOAD 'pg_bao';"), StatementKind::Meta);
        assert_eq!(classify("with x as (select 1) select * from x"), StatementKind::Meta);
        assert_eq!(classify(""), StatementKind::Meta);
    }

    #[test]
    fn test_canonicalize_strips_explain() {
        assert_eq!(
            canonicalize("EXPLAIN ANALYZE SELECT * FROM title;"),
            "SELECT * FROM title;"
        );
        assert_eq!(
            canonicalize("explain (format json) Select id from t"),
            "Select id from t"
        );
    }

    #[test]
    fn test_canonicalize_keeps_plain_select() {
        assert_eq!(canonicalize("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_canonicalize_explain_without_select() {
        assert_eq!(canonicalize("EXPLAIN VALUES (1)"), "EXPLAIN VALUES (1)");
    }

    #[test]
    fn test_canonicalize_leaves_meta_alone() {
        assert_eq!(
            canonicalize("SET search_path TO selection"),
            "SET search_path TO selection"
        );
    }

    #[test]
    fn test_canonicalize_non_ascii() {
        assert_eq!(
            canonicalize("explain select 'größe' from t"),
            "select 'größe' from t"
        );
    }

    #[test]
    fn test_statement_accessors() {
        let stmt = Statement::new("explain select * from t");
        assert!(stmt.is_workload());
        assert_eq!(stmt.canonical(), "select * from t");
        assert_eq!(stmt.text(), "explain select * from t");

        let meta = Statement::new("SET x=1");
        assert_eq!(meta.kind(), StatementKind::Meta);
        assert_eq!(meta.canonical(), "SET x=1");
    }

    #[test]
    fn test_parse_statements() {
        let contents = "-- JOB query 1a\nSET enable_bao TO on;\r\nSELECT 1;\n\n--SELECT 2;\nexplain select 3;\n";
        let stmts = parse_statements(contents);
        let texts: Vec<&str> = stmts.iter().map(Statement::text).collect();
        assert_eq!(texts, vec!["SET enable_bao TO on;", "SELECT 1;", "explain select 3;"]);
        assert!(!stmts[0].is_workload());
        assert!(stmts[1].is_workload());
    }

    #[test]
    fn test_indented_comment_is_kept() {
        let stmts = parse_statements("  -- not at column zero\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind(), StatementKind::Meta);
    }

    #[test]
    fn test_read_statements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workload.sql");
        std::fs::write(&path, "-- header\nSELECT 1;\nSET x = 1;\n").unwrap();
        let stmts = read_statements(&path).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(read_statements(&dir.path().join("missing.sql")).is_err());
    }

    proptest! {
        #[test]
        fn prop_canonicalize_idempotent(prefix in "(explain |EXPLAIN ANALYZE |select |SET )?", body in "[a-zA-Z0-9 *,.=()']{0,40}") {
            let raw = format!("{}{}", prefix, body);
            let once = canonicalize(&raw);
            prop_assert_eq!(canonicalize(once), once);
        }

        #[test]
        fn prop_canonicalize_noop_on_select(body in "[a-zA-Z0-9 *,.=()']{0,40}") {
            let raw = format!("SELECT {}", body);
            prop_assert_eq!(canonicalize(&raw), raw.as_str());
        }

        #[test]
        fn prop_canonicalize_noop_on_meta(keyword in "(SET|LOAD|RESET|DISCARD|create)", body in "[a-zA-Z0-9 *,.=()']{0,40}") {
            let raw = format!("{} {} select 1", keyword, body);
            prop_assert_eq!(canonicalize(&raw), raw.as_str());
        }
    }
}
