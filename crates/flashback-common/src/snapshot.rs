use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored snapshot: a note anchored to a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub content: String,
    pub anchor_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Input for creating a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub content: String,
    pub anchor_date: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl NewSnapshot {
    /// A snapshot anchored at `anchor_date` with no tags and empty metadata.
    pub fn text(content: impl Into<String>, anchor_date: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            anchor_date,
            tags: Vec::new(),
            metadata: empty_object(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Trimmed, non-empty tag names with duplicates removed, first occurrence wins.
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut seen = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !seen.iter().any(|t: &String| t == tag) {
                seen.push(tag.to_string());
            }
        }
        seen
    }
}

impl Snapshot {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
