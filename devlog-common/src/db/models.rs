//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Classification of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Narrative/strategic record
    Addendum,
    /// Technical/minimal record
    DevLog,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::Addendum, DocumentType::DevLog];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Addendum => "addendum",
            DocumentType::DevLog => "dev_log",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addendum" => Ok(DocumentType::Addendum),
            "dev_log" => Ok(DocumentType::DevLog),
            other => Err(Error::InvalidInput(format!(
                "document_type must be one of addendum, dev_log (got '{}')",
                other
            ))),
        }
    }
}

/// One stored journal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub project: String,
    pub document_type: DocumentType,
    pub entry_date: NaiveDate,
    /// Ordinal within (project, document_type, entry_date), starting at 1
    pub entry_number: i64,
    pub title: String,
    pub entry_type: Option<String>,
    /// Canonical status key (see [`crate::status`])
    pub status: Option<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub narrative_signal: Option<String>,
    pub next_steps: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row shape shared by both backends
///
/// `document_type` stays a string here so the same `FromRow` derive decodes
/// SQLite and PostgreSQL rows alike.
#[derive(Debug, sqlx::FromRow)]
pub struct EntryRecord {
    pub id: i64,
    pub project: String,
    pub document_type: String,
    pub entry_date: NaiveDate,
    pub entry_number: i64,
    pub title: String,
    pub entry_type: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub narrative_signal: Option<String>,
    pub next_steps: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRecord> for Entry {
    type Error = Error;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let document_type = record.document_type.parse().map_err(|_| {
            Error::Internal(format!(
                "entry {} has unknown document_type '{}'",
                record.id, record.document_type
            ))
        })?;

        Ok(Entry {
            id: record.id,
            project: record.project,
            document_type,
            entry_date: record.entry_date,
            entry_number: record.entry_number,
            title: record.title,
            entry_type: record.entry_type,
            status: record.status,
            summary: record.summary,
            details: record.details,
            narrative_signal: record.narrative_signal,
            next_steps: record.next_steps,
            is_deleted: record.is_deleted,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Input for creating an entry (entry_number is assigned by the store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub project: String,
    pub document_type: DocumentType,
    pub entry_date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub narrative_signal: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
}

impl NewEntry {
    pub fn new(
        project: impl Into<String>,
        document_type: DocumentType,
        entry_date: NaiveDate,
        title: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            document_type,
            entry_date,
            title: title.into(),
            entry_type: None,
            status: None,
            summary: None,
            details: None,
            narrative_signal: None,
            next_steps: None,
        }
    }

    /// Apply storage-side normalization (status folding, title trim)
    pub fn normalized(mut self) -> crate::Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        self.status = crate::status::normalize_optional_status(self.status.as_deref());
        Ok(self)
    }
}

/// Partial update: `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub project: Option<String>,
    pub document_type: Option<DocumentType>,
    pub entry_date: Option<NaiveDate>,
    pub title: Option<String>,
    pub entry_type: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub narrative_signal: Option<String>,
    pub next_steps: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        *self == EntryPatch::default()
    }

    /// Apply storage-side normalization (status folding, title trim)
    pub fn normalized(mut self) -> crate::Result<Self> {
        if let Some(title) = self.title.take() {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::InvalidInput("title must not be empty".to_string()));
            }
            self.title = Some(title);
        }
        self.status = self.status.map(|raw| crate::status::normalize_status(&raw));
        Ok(self)
    }

    /// Merge the patch over a stored entry, yielding the post-update values
    ///
    /// `entry_number` is carried over unchanged; renumbering is the store's job.
    pub fn apply_to(&self, current: &Entry) -> Entry {
        let mut merged = current.clone();
        if let Some(project) = &self.project {
            merged.project = project.clone();
        }
        if let Some(document_type) = self.document_type {
            merged.document_type = document_type;
        }
        if let Some(entry_date) = self.entry_date {
            merged.entry_date = entry_date;
        }
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(entry_type) = &self.entry_type {
            merged.entry_type = Some(entry_type.clone());
        }
        if let Some(status) = &self.status {
            // An explicit status that folds to nothing clears the field
            merged.status = Some(status.clone()).filter(|s| !s.is_empty());
        }
        if let Some(summary) = &self.summary {
            merged.summary = Some(summary.clone());
        }
        if let Some(details) = &self.details {
            merged.details = Some(details.clone());
        }
        if let Some(narrative_signal) = &self.narrative_signal {
            merged.narrative_signal = Some(narrative_signal.clone());
        }
        if let Some(next_steps) = &self.next_steps {
            merged.next_steps = Some(next_steps.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        let now = Utc::now();
        Entry {
            id: 7,
            project: "alpha".to_string(),
            document_type: DocumentType::DevLog,
            entry_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            entry_number: 2,
            title: "Wire up auth".to_string(),
            entry_type: None,
            status: Some("in_progress".to_string()),
            summary: Some("first pass".to_string()),
            details: None,
            narrative_signal: None,
            next_steps: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_document_type_parse_and_display() {
        assert_eq!("dev_log".parse::<DocumentType>().unwrap(), DocumentType::DevLog);
        assert_eq!(DocumentType::Addendum.to_string(), "addendum");
        assert!("devlog".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&DocumentType::DevLog).unwrap();
        assert_eq!(json, "\"dev_log\"");
    }

    #[test]
    fn test_new_entry_normalizes_status_and_title() {
        let mut input = NewEntry::new(
            "alpha",
            DocumentType::Addendum,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            "  Kickoff  ",
        );
        input.status = Some("✅ Done".to_string());

        let normalized = input.normalized().unwrap();
        assert_eq!(normalized.title, "Kickoff");
        assert_eq!(normalized.status.as_deref(), Some("complete"));
    }

    #[test]
    fn test_new_entry_rejects_blank_title() {
        let input = NewEntry::new(
            "alpha",
            DocumentType::Addendum,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            "   ",
        );
        assert!(matches!(input.normalized(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let current = sample_entry();
        let patch = EntryPatch {
            title: Some("Wire up auth (v2)".to_string()),
            details: Some("token header".to_string()),
            ..Default::default()
        };

        let merged = patch.apply_to(&current);
        assert_eq!(merged.title, "Wire up auth (v2)");
        assert_eq!(merged.details.as_deref(), Some("token header"));
        assert_eq!(merged.summary, current.summary);
        assert_eq!(merged.status, current.status);
        assert_eq!(merged.entry_number, current.entry_number);
    }

    #[test]
    fn test_patch_empty_status_clears_field() {
        let patch = EntryPatch {
            status: Some("✅".to_string()),
            ..Default::default()
        }
        .normalized()
        .unwrap();

        let merged = patch.apply_to(&sample_entry());
        assert_eq!(merged.status, None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(EntryPatch::default().is_empty());
        let patch = EntryPatch {
            summary: Some(String::new()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
