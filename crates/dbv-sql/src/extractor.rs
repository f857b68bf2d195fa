//! Impacted-table extraction.
//!
//! A change script's impacted tables are the ones that must be backed up
//! before it runs. Two extractors implement [`TableExtractor`]:
//!
//! - [`KeywordScanner`] scans for DDL/DML keywords followed by an identifier.
//!   It works on any text the backend accepts, including syntax sqlparser
//!   does not know.
//! - [`AstExtractor`] walks the sqlparser AST with `visit_relations`.
//!
//! Both normalize names to lower case without quotes, and both keep a
//! qualified name (`db.table`, `schema.table`) only when every qualifier is
//! one of the active database's namespaces. References into other databases
//! are dropped.

use crate::parser::SqlParser;
use regex::Regex;
use sqlparser::ast::visit_relations;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::OnceLock;

/// Extracts the set of tables a SQL script touches
pub trait TableExtractor {
    /// Bare, lower-cased names of the local tables referenced by `sql`
    fn impacted_tables(&self, sql: &str) -> BTreeSet<String>;
}

/// Namespaces that denote the active database when nothing better is known
pub const DEFAULT_NAMESPACES: &[&str] = &["main"];

const IDENT: &str = r#"(?:"[^"]+"|`[^`]+`|[A-Za-z_][A-Za-z0-9_$]*)"#;

/// Leading keyword sequences, each immediately followed by a table name.
///
/// The flag marks prefixes after which `name(` is a table function call
/// rather than a table followed by a column list.
const KEYWORD_PREFIXES: &[(&str, bool)] = &[
    (r"\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:TEMP|TEMPORARY)\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?", false),
    (r"\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?", false),
    (r"\bALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?", false),
    (r"\bINSERT\s+(?:IGNORE\s+|OR\s+[A-Za-z]+\s+)?INTO\s+", false),
    (r"\bUPDATE\s+", false),
    (r"\bDELETE\s+FROM\s+", false),
    (r"\bSELECT\b[^;]*?\bFROM\s+", true),
    (r"\bJOIN\s+", true),
    (r"\bTRUNCATE\s+(?:TABLE\s+)?", false),
    (r"\bCREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:IDENT\s+)?ON\s+", false),
];

/// Words that can follow a scanned keyword without being a table name
const STOPLIST: &[&str] = &[
    "set", "select", "if", "values", "lateral", "only", "on", "where", "with",
];

fn keyword_patterns() -> &'static [(Regex, bool)] {
    static PATTERNS: OnceLock<Vec<(Regex, bool)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let qualified = format!(r"{IDENT}(?:\s*\.\s*{IDENT})*");
        KEYWORD_PREFIXES
            .iter()
            .map(|(prefix, call_means_function)| {
                let prefix = prefix.replace("IDENT", IDENT);
                let re =
                    Regex::new(&format!(r"(?i){prefix}(?P<table>{qualified})\s*(?P<call>\()?"))
                        .expect("valid regex");
                (re, *call_means_function)
            })
            .collect()
    })
}

fn ident_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENT).expect("valid regex"))
}

/// Blank out string literals and comments so keywords inside them are not
/// scanned.
fn strip_literals_and_comments(sql: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)'(?:[^']|'')*'|--[^\n]*|/\*.*?\*/").expect("valid regex")
    });
    re.replace_all(sql, |caps: &regex::Captures<'_>| {
        if caps[0].starts_with('\'') {
            "''"
        } else {
            " "
        }
    })
    .into_owned()
}

/// Split a possibly qualified, possibly quoted name into lower-cased parts
fn split_qualified(raw: &str) -> Vec<String> {
    ident_pattern()
        .find_iter(raw)
        .map(|m| {
            let part = m.as_str();
            let unquoted = if (part.starts_with('"') && part.ends_with('"'))
                || (part.starts_with('`') && part.ends_with('`'))
            {
                &part[1..part.len() - 1]
            } else {
                part
            };
            unquoted.to_lowercase()
        })
        .collect()
}

/// Reduce qualified parts to a bare local table name, if they are local
fn resolve_local(parts: &[String], namespaces: &BTreeSet<String>) -> Option<String> {
    let (name, qualifiers) = parts.split_last()?;
    if qualifiers.iter().all(|q| namespaces.contains(q)) {
        Some(name.clone())
    } else {
        log::debug!(
            "Ignoring reference to '{}' outside the active database",
            parts.join(".")
        );
        None
    }
}

fn namespace_set<I, S>(namespaces: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    namespaces
        .into_iter()
        .map(|n| n.as_ref().to_lowercase())
        .collect()
}

/// Keyword-driven table extraction
#[derive(Debug, Clone)]
pub struct KeywordScanner {
    namespaces: BTreeSet<String>,
}

impl KeywordScanner {
    /// Scanner treating `namespaces` as qualifiers of the active database
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            namespaces: namespace_set(namespaces),
        }
    }
}

impl Default for KeywordScanner {
    fn default() -> Self {
        Self::with_namespaces(DEFAULT_NAMESPACES.iter().copied())
    }
}

impl TableExtractor for KeywordScanner {
    fn impacted_tables(&self, sql: &str) -> BTreeSet<String> {
        let cleaned = strip_literals_and_comments(sql);
        let mut tables = BTreeSet::new();
        for (pattern, call_means_function) in keyword_patterns() {
            for caps in pattern.captures_iter(&cleaned) {
                if *call_means_function && caps.name("call").is_some() {
                    continue;
                }
                let Some(raw) = caps.name("table") else {
                    continue;
                };
                let parts = split_qualified(raw.as_str());
                let Some(table) = resolve_local(&parts, &self.namespaces) else {
                    continue;
                };
                if !STOPLIST.contains(&table.as_str()) {
                    tables.insert(table);
                }
            }
        }
        tables
    }
}

/// AST-driven table extraction through sqlparser's relation visitor.
///
/// Only sees relations sqlparser can parse; unparseable SQL yields no
/// tables.
pub struct AstExtractor {
    parser: SqlParser,
    namespaces: BTreeSet<String>,
}

impl AstExtractor {
    /// Extractor treating `namespaces` as qualifiers of the active database
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            parser: SqlParser::duckdb(),
            namespaces: namespace_set(namespaces),
        }
    }
}

impl Default for AstExtractor {
    fn default() -> Self {
        Self::with_namespaces(DEFAULT_NAMESPACES.iter().copied())
    }
}

impl TableExtractor for AstExtractor {
    fn impacted_tables(&self, sql: &str) -> BTreeSet<String> {
        let statements = match self.parser.parse(sql) {
            Ok(stmts) => stmts,
            Err(e) => {
                log::debug!("AST table extraction skipped: {e}");
                return BTreeSet::new();
            }
        };

        let mut tables = BTreeSet::new();
        for stmt in &statements {
            let _ = visit_relations(stmt, |relation| {
                let parts: Vec<String> = relation
                    .0
                    .iter()
                    .filter_map(|p| p.as_ident())
                    .map(|ident| ident.value.to_lowercase())
                    .collect();
                if let Some(table) = resolve_local(&parts, &self.namespaces) {
                    tables.insert(table);
                }
                ControlFlow::<()>::Continue(())
            });
        }
        tables
    }
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
