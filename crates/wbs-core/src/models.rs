use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Depth class of a WBS node. Ordered from the outermost container inward.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
    sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskLevel {
    Project,
    Building,
    Activity,
    #[default]
    Task,
}

pub const LEVEL_ORDER: [TaskLevel; 4] = [
    TaskLevel::Project,
    TaskLevel::Building,
    TaskLevel::Activity,
    TaskLevel::Task,
];

impl TaskLevel {
    /// Position in [`LEVEL_ORDER`], 0 for `Project`.
    pub fn depth(self) -> usize {
        LEVEL_ORDER
            .iter()
            .position(|l| *l == self)
            .unwrap_or(LEVEL_ORDER.len() - 1)
    }

    pub fn child_level(self) -> Option<TaskLevel> {
        LEVEL_ORDER.get(self.depth() + 1).copied()
    }

    pub fn parent_level(self) -> Option<TaskLevel> {
        self.depth().checked_sub(1).map(|i| LEVEL_ORDER[i])
    }

    /// Levels that usually group other work. Only used to seed the summary flag.
    pub fn is_container_like(self) -> bool {
        matches!(self, TaskLevel::Building | TaskLevel::Activity)
    }
}

impl std::fmt::Display for TaskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskLevel::Project => write!(f, "project"),
            TaskLevel::Building => write!(f, "building"),
            TaskLevel::Activity => write!(f, "activity"),
            TaskLevel::Task => write!(f, "task"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task level: {0}")]
pub struct ParseTaskLevelError(String);

impl FromStr for TaskLevel {
    type Err = ParseTaskLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "project" => Ok(TaskLevel::Project),
            "building" => Ok(TaskLevel::Building),
            "activity" => Ok(TaskLevel::Activity),
            "task" => Ok(TaskLevel::Task),
            _ => Err(ParseTaskLevelError(s.to_string())),
        }
    }
}

/// Whether a node's schedule is computed by the engine or entered by a user.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Auto,
    #[default]
    Manual,
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskMode::Auto => write!(f, "auto"),
            TaskMode::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task mode: {0}")]
pub struct ParseTaskModeError(String);

impl FromStr for TaskMode {
    type Err = ParseTaskModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TaskMode::Auto),
            "manual" => Ok(TaskMode::Manual),
            _ => Err(ParseTaskModeError(s.to_string())),
        }
    }
}

/// A node of the work breakdown structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: Uuid,
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub level: TaskLevel,
    /// Display order among siblings, unique per (project, parent)
    pub sort_order: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<f64>,
    pub progress: i32,
    pub is_summary: bool,
    pub is_milestone: bool,
    pub task_mode: TaskMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TaskNode {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            project_id: Uuid::nil(),
            parent_id: None,
            level: TaskLevel::Task,
            sort_order: 1,
            name: "".to_string(),
            start_date: None,
            end_date: None,
            duration_days: None,
            progress: 0,
            is_summary: false,
            is_milestone: false,
            task_mode: TaskMode::Manual,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl TaskNode {
    /// Both dates set; only such nodes contribute to a parent's rollup.
    pub fn is_scheduled(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskData {
    pub project_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub level: TaskLevel,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_days: Option<f64>,
    #[serde(default)]
    pub is_milestone: bool,
}

/// Sparse update. `None` leaves a field alone; for nullable fields
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<TaskLevel>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<Option<f64>>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub is_milestone: Option<bool>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<Uuid>>,
}

impl UpdateTaskData {
    /// True when any field that feeds a parent's rollup is present.
    pub fn touches_schedule(&self) -> bool {
        self.start_date.is_some()
            || self.end_date.is_some()
            || self.duration_days.is_some()
            || self.progress.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.level.is_none()
            && self.sort_order.is_none()
            && !self.touches_schedule()
            && self.is_milestone.is_none()
            && self.parent_id.is_none()
    }
}

/// Result of a delete, including what happened to the former parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub task_id: Uuid,
    /// The node itself plus every descendant removed by the cascade
    pub removed: u64,
    pub parent_id: Option<Uuid>,
    /// Set when the parent lost its last child and went back to manual mode
    pub parent_demoted: bool,
}

/// What happens to a summary node's derived values when its last child goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevertPolicy {
    /// Keep the last rolled-up schedule and progress as manual values
    #[default]
    Keep,
    /// Clear dates and duration, reset progress to 0
    Clear,
}

impl FromStr for RevertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(RevertPolicy::Keep),
            "clear" => Ok(RevertPolicy::Clear),
            _ => Err(format!("Invalid revert policy: {}", s)),
        }
    }
}

/// Engine settings. Separate from the CLI config so hosts can embed the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on ancestor levels visited by one rollup walk
    pub max_walk_depth: usize,
    pub revert_policy: RevertPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_walk_depth: 64,
            revert_policy: RevertPolicy::Keep,
        }
    }
}
