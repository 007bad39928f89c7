// Task data model

use chrono::NaiveDate;
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier assigned by the store when a task is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(TaskId)
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(TaskId)
    }
}

/// Completion flag of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    StillWorking,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::StillWorking => "still_working",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// The other status. Both transitions are always legal.
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::StillWorking => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::StillWorking,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct ParseStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "still_working" => Ok(TaskStatus::StillWorking),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: ParseStatusError| FromSqlError::Other(Box::new(e)))
    }
}

/// A stored task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
}

/// Fields supplied when creating a task; the store assigns id and status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// One row of the task listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            status: task.status,
        }
    }
}

/// Completed-versus-total counter shown under the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
}

impl Completion {
    pub fn of(tasks: &[TaskSummary]) -> Self {
        Self {
            completed: tasks.iter().filter(|t| t.status.is_completed()).count(),
            total: tasks.len(),
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Complete tasks: {}/{}", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [TaskStatus::StillWorking, TaskStatus::Completed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_defaults_to_still_working() {
        assert_eq!(TaskStatus::default(), TaskStatus::StillWorking);
        assert_eq!(TaskStatus::StillWorking.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Completed.toggled(), TaskStatus::StillWorking);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::StillWorking).unwrap();
        assert_eq!(json, "\"still_working\"");
    }

    #[test]
    fn test_task_id_parse() {
        assert_eq!("42".parse::<TaskId>().unwrap(), TaskId(42));
        assert_eq!("#7".parse::<TaskId>().unwrap(), TaskId(7));
        assert!("seven".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_task_serializes_deadline_as_iso_date() {
        let task = Task {
            id: TaskId(1),
            title: "Buy milk".to_string(),
            description: None,
            deadline: NaiveDate::from_ymd_opt(2024, 1, 1),
            status: TaskStatus::Completed,
        };

        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"deadline\":\"2024-01-01\""));
        assert!(json.contains("\"status\":\"completed\""));
    }

    #[test]
    fn test_completion_counts() {
        let tasks = vec![
            TaskSummary {
                id: TaskId(1),
                title: "a".to_string(),
                status: TaskStatus::Completed,
            },
            TaskSummary {
                id: TaskId(2),
                title: "b".to_string(),
                status: TaskStatus::StillWorking,
            },
        ];

        let completion = Completion::of(&tasks);
        assert_eq!(completion, Completion { completed: 1, total: 2 });
        assert_eq!(completion.to_string(), "Complete tasks: 1/2");
        assert_eq!(Completion::of(&[]).to_string(), "Complete tasks: 0/0");
    }
}
