use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Title given to tasks created locally before anyone has typed one.
pub const DEFAULT_TITLE: &str = "No Title";

/// A unique identifier for a task record. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a new, random task ID.
    pub fn new() -> Self {
        TaskId(Uuid::new_v4().to_string())
    }

    /// Creates a task ID from a string.
    pub fn from_str(s: &str) -> Self {
        TaskId(s.to_string())
    }

    /// Returns the inner string representation of the task ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Board column a task lives in. The declaration order is the board
/// order, left to right, and drives both `Ord` and the listing layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    NotStarted,
    Planned,
    InProgress,
    Testing,
    Done,
}

impl Status {
    /// All statuses in board order.
    pub const ALL: [Status; 5] = [
        Status::NotStarted,
        Status::Planned,
        Status::InProgress,
        Status::Testing,
        Status::Done,
    ];

    /// Parses the kebab-case wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not-started" => Some(Self::NotStarted),
            "planned" => Some(Self::Planned),
            "in-progress" => Some(Self::InProgress),
            "testing" => Some(Self::Testing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Testing => "testing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single task record, as held in the store and sent on the wire.
///
/// Two records are equal for diffing purposes iff every field compares
/// equal. Timestamps are stamped by the server and flow back over the
/// subscribe feed; a freshly created local task carries none, and a
/// record without `updated_at` sorts as the epoch in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: Status,
    /// Soft-delete marker. A deleted record stays in the store but is
    /// excluded from listings.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl Task {
    /// A new local task in the given column: random id, default title,
    /// timestamps left for the server to stamp.
    pub fn new(status: Status) -> Self {
        Self {
            id: TaskId::new(),
            title: DEFAULT_TITLE.to_string(),
            status,
            deleted_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_round_trip_the_board_order() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("blocked"), None);
        assert!(Status::Planned < Status::Done);
    }

    #[test]
    fn record_deserializes_from_server_payload() {
        let json = r#"{
            "id": "t-1",
            "title": "Wire up the feed",
            "status": "in-progress",
            "deletedAt": null,
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-02T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).expect("payload decodes");
        assert_eq!(task.id.as_str(), "t-1");
        assert_eq!(task.status, Status::InProgress);
        assert!(!task.is_deleted());
        assert!(task.created_at.unwrap() < task.updated_at.unwrap());
    }

    #[test]
    fn fresh_local_task_serializes_without_timestamps() {
        let task = Task::new(Status::Planned);
        let value = serde_json::to_value(&task).expect("task encodes");
        assert_eq!(value["title"], DEFAULT_TITLE);
        assert_eq!(value["status"], "planned");
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("createdAt"));
        assert!(!obj.contains_key("updatedAt"));
        assert!(!obj.contains_key("deletedAt"));
    }
}
