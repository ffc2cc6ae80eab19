use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Bead Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BeadStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl BeadStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, BeadStatus::Closed)
    }
}

// ============================================================================
// Issue Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Feature,
    #[default]
    Task,
    Epic,
    Chore,
}

/// Highest (least urgent) priority value; 0 is most urgent
pub const MAX_PRIORITY: u8 = 4;

fn default_priority() -> u8 {
    2
}

// ============================================================================
// Bead
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bead {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: BeadStatus,
    pub priority: u8,
    pub issue_type: IssueType,
    pub assignee: Option<String>,
    pub labels: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBeadRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBeadRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<BeadStatus>,
    pub priority: Option<u8>,
    pub issue_type: Option<IssueType>,
    /// `Some(None)` clears the assignee
    #[serde(default, deserialize_with = "double_option")]
    pub assignee: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseBeadRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelRequest {
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelEvent {
    pub bead_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BeadDeletedEvent {
    pub id: String,
    pub title: String,
}

// ============================================================================
// Dependencies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `from` cannot start until `to` is closed
    #[default]
    Blocks,
    Related,
    ParentChild,
    DiscoveredFrom,
}

/// Directed edge: `from_id` depends on `to_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub from_id: String,
    pub to_id: String,
    pub kind: DependencyKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyRequest {
    pub depends_on: String,
    #[serde(default)]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct BeadDependencies {
    /// Edges where this bead is `from_id`
    pub depends_on: Vec<Dependency>,
    /// Edges where this bead is `to_id`
    pub dependents: Vec<Dependency>,
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub bead_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BeadDetail {
    #[serde(flatten)]
    pub bead: Bead,
    pub dependencies: BeadDependencies,
    pub comments: Vec<Comment>,
}

/// Query parameters for listing beads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeadQuery {
    pub status: Option<BeadStatus>,
    pub label: Option<String>,
    pub assignee: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateBeadRequest = serde_json::from_value(json!({"title": "Fix login"})).unwrap();
        assert_eq!(req.priority, 2);
        assert_eq!(req.issue_type, IssueType::Task);
        assert!(req.labels.is_empty());
    }

    #[test]
    fn test_update_request_distinguishes_null_assignee() {
        let absent: UpdateBeadRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.assignee, None);

        let cleared: UpdateBeadRequest = serde_json::from_value(json!({"assignee": null})).unwrap();
        assert_eq!(cleared.assignee, Some(None));

        let set: UpdateBeadRequest = serde_json::from_value(json!({"assignee": "ann"})).unwrap();
        assert_eq!(set.assignee, Some(Some("ann".to_string())));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(BeadStatus::InProgress).unwrap(), json!("in_progress"));
        assert_eq!(
            serde_json::to_value(DependencyKind::DiscoveredFrom).unwrap(),
            json!("discovered_from")
        );
    }
}
