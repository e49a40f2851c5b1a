//! The todo record and its schema rules.
//!
//! # Design
//! Validation lives here as plain functions rather than inside any storage
//! driver. Every store calls `normalize_title` on create and
//! `TodoPatch::apply` on update, so the same rules hold no matter which
//! backend persists the record.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single todo item as stored and as returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Build a fresh record with a new id and a creation timestamp.
    ///
    /// The title is trimmed and must not be empty.
    pub fn new(title: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: normalize_title(title)?,
            completed: false,
            created_at: now_millis(),
        })
    }

    /// Check the invariants a record must hold before it is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::TitleRequired);
        }
        Ok(())
    }
}

/// Partial update: only fields that are `Some` are applied.
///
/// A JSON `null` deserializes to `None` and is treated like an absent field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }

    /// Apply the patch to `todo` in place, then re-validate the result.
    ///
    /// On error `todo` is left untouched.
    pub fn apply(&self, todo: &mut Todo) -> Result<(), ValidationError> {
        let title = match &self.title {
            Some(raw) => Some(normalize_title(raw)?),
            None => None,
        };
        if let Some(title) = title {
            todo.title = title;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        todo.validate()
    }
}

/// Schema violations detected before a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,
}

/// Trim a title and reject it if nothing is left.
pub fn normalize_title(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    Ok(trimmed.to_string())
}

/// Current time at millisecond precision, the resolution the stores keep.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_title_and_defaults_completed() {
        let todo = Todo::new("  Buy milk ").unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);
        assert_eq!(todo.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn new_rejects_blank_title() {
        assert_eq!(Todo::new(""), Err(ValidationError::TitleRequired));
        assert_eq!(Todo::new(" \t\n "), Err(ValidationError::TitleRequired));
    }

    #[test]
    fn todo_serializes_with_camel_case_fields() {
        let todo = Todo {
            id: Uuid::nil(),
            title: "Test".to_string(),
            completed: false,
            created_at: DateTime::from_timestamp_millis(0).unwrap(),
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["title"], "Test");
        assert_eq!(json["completed"], false);
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn patch_fields_are_optional() {
        let patch: TodoPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());

        let patch: TodoPatch = serde_json::from_str(r#"{"title":null,"completed":true}"#).unwrap();
        assert!(patch.title.is_none());
        assert_eq!(patch.completed, Some(true));
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut todo = Todo::new("Walk dog").unwrap();
        let before = todo.clone();

        TodoPatch {
            title: None,
            completed: Some(true),
        }
        .apply(&mut todo)
        .unwrap();

        assert!(todo.completed);
        assert_eq!(todo.title, before.title);
        assert_eq!(todo.created_at, before.created_at);
        assert_eq!(todo.id, before.id);
    }

    #[test]
    fn patch_trims_title() {
        let mut todo = Todo::new("Walk dog").unwrap();
        TodoPatch {
            title: Some("  Walk cat  ".to_string()),
            completed: None,
        }
        .apply(&mut todo)
        .unwrap();
        assert_eq!(todo.title, "Walk cat");
    }

    #[test]
    fn patch_with_blank_title_leaves_record_untouched() {
        let mut todo = Todo::new("Walk dog").unwrap();
        let before = todo.clone();
        let err = TodoPatch {
            title: Some("   ".to_string()),
            completed: Some(true),
        }
        .apply(&mut todo)
        .unwrap_err();
        assert_eq!(err, ValidationError::TitleRequired);
        assert_eq!(todo, before);
    }

    #[test]
    fn empty_patch_is_identity() {
        let mut todo = Todo::new("Walk dog").unwrap();
        let before = todo.clone();
        TodoPatch::default().apply(&mut todo).unwrap();
        assert_eq!(todo, before);
    }
}
