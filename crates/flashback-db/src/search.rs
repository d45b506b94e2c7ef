//! Snapshot search filters.
//!
//! A [`SearchQuery`] lowers to a list of [`Predicate`]s. Each predicate
//! renders one SQL condition against the `snapshots s` alias plus its bound
//! values, and the conditions are always joined with `AND`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use flashback_common::{Snapshot, SortOrder};
use regex::Regex;
use rusqlite::types::Value;
use serde::Serialize;

use crate::timestamp::format_timestamp;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

static FTS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("static token pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Full-text match over content. Falls back to a substring match when
    /// the text has no indexable tokens.
    FullText(String),
    /// Case-insensitive substring of content.
    ContentContains(String),
    /// `anchor_date >= value`
    AnchorFrom(DateTime<Utc>),
    /// `anchor_date <= value`
    AnchorTo(DateTime<Utc>),
    /// Snapshot carries every one of these tags.
    AllTags(Vec<String>),
    /// Snapshot carries at least one of these tags.
    AnyTags(Vec<String>),
    /// Not soft-deleted.
    Live,
}

impl Predicate {
    fn render(&self) -> (String, Vec<Value>) {
        match self {
            Predicate::FullText(text) => match fts_query(text) {
                Some(query) => (
                    "s.id IN (SELECT rowid FROM snapshots_fts WHERE snapshots_fts MATCH ?)"
                        .to_string(),
                    vec![Value::Text(query)],
                ),
                None => Predicate::ContentContains(text.trim().to_string()).render(),
            },
            Predicate::ContentContains(text) => (
                "instr(lower(s.content), lower(?)) > 0".to_string(),
                vec![Value::Text(text.clone())],
            ),
            Predicate::AnchorFrom(from) => (
                "s.anchor_date >= ?".to_string(),
                vec![Value::Text(format_timestamp(from))],
            ),
            Predicate::AnchorTo(to) => (
                "s.anchor_date <= ?".to_string(),
                vec![Value::Text(format_timestamp(to))],
            ),
            Predicate::AllTags(tags) => {
                let tags = dedup(tags);
                if tags.is_empty() {
                    return ("1 = 1".to_string(), Vec::new());
                }
                let sql = format!(
                    "? = (SELECT COUNT(DISTINCT t.name) FROM snapshot_tags st
                          JOIN tags t ON t.id = st.tag_id
                          WHERE st.snapshot_id = s.id AND t.name IN ({}))",
                    placeholders(tags.len())
                );
                let mut values = vec![Value::Integer(tags.len() as i64)];
                values.extend(tags.into_iter().map(Value::Text));
                (sql, values)
            }
            Predicate::AnyTags(tags) => {
                let tags = dedup(tags);
                if tags.is_empty() {
                    return ("0 = 1".to_string(), Vec::new());
                }
                let sql = format!(
                    "EXISTS (SELECT 1 FROM snapshot_tags st
                             JOIN tags t ON t.id = st.tag_id
                             WHERE st.snapshot_id = s.id AND t.name IN ({}))",
                    placeholders(tags.len())
                );
                (sql, tags.into_iter().map(Value::Text).collect())
            }
            Predicate::Live => ("s.deleted_at IS NULL".to_string(), Vec::new()),
        }
    }
}

/// Rendered `WHERE` clause (empty when there are no predicates) with its
/// positional parameters in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn where_clause(predicates: &[Predicate]) -> WhereClause {
    if predicates.is_empty() {
        return WhereClause::default();
    }
    let mut conditions = Vec::with_capacity(predicates.len());
    let mut params = Vec::new();
    for predicate in predicates {
        let (sql, values) = predicate.render();
        conditions.push(format!("({sql})"));
        params.extend(values);
    }
    WhereClause {
        sql: format!("WHERE {}", conditions.join(" AND ")),
        params,
    }
}

/// FTS5 query for free text: each word quoted, words AND-ed. `None` when the
/// text holds no letters or digits.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = FTS_TOKEN
        .find_iter(text)
        .map(|m| format!("\"{}\"", m.as_str()))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    /// Every tag must match.
    pub tags: Vec<String>,
    /// At least one tag must match.
    pub tags_any: Vec<String>,
    pub anchor_from: Option<DateTime<Utc>>,
    pub anchor_to: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    /// Page size; `None` or `0` means [`DEFAULT_LIMIT`], capped at [`MAX_LIMIT`].
    pub limit: Option<usize>,
    pub offset: usize,
    pub include_deleted: bool,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(n) => n.min(MAX_LIMIT),
        }
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            predicates.push(if fts_query(text).is_some() {
                Predicate::FullText(text.to_string())
            } else {
                Predicate::ContentContains(text.to_string())
            });
        }
        if let Some(from) = self.anchor_from {
            predicates.push(Predicate::AnchorFrom(from));
        }
        if let Some(to) = self.anchor_to {
            predicates.push(Predicate::AnchorTo(to));
        }
        if !self.tags.is_empty() {
            predicates.push(Predicate::AllTags(self.tags.clone()));
        }
        if !self.tags_any.is_empty() {
            predicates.push(Predicate::AnyTags(self.tags_any.clone()));
        }
        if !self.include_deleted {
            predicates.push(Predicate::Live);
        }
        predicates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub snapshots: Vec<Snapshot>,
    pub total: usize,
    pub has_more: bool,
}

fn dedup(tags: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !unique.iter().any(|u| u == tag) {
            unique.push(tag.to_string());
        }
    }
    unique
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
