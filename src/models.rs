//! Core models for the milestone library
//!
//! This module contains the plan tree (months, weeks, days, tasks), the
//! coordinates used to address a task inside it, and the domain error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::deserialize_completed;
use crate::store::{PlanKey, StoreError};

/// The four node kinds of a plan tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Month,
    Week,
    Day,
    Task,
}

impl NodeKind {
    /// Prefix used for synthesized ids
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Month => "month",
            NodeKind::Week => "week",
            NodeKind::Day => "day",
            NodeKind::Task => "task",
        }
    }

    /// Positional default title, `position` is 1-based
    pub fn default_title(&self, position: usize) -> String {
        match self {
            NodeKind::Month => format!("Month {}", position),
            NodeKind::Week => format!("Week {}", position),
            NodeKind::Day => format!("Day {}", position),
            NodeKind::Task => format!("Task {}", position),
        }
    }
}

/// Generates a fresh node id such as `week-3f2b...`
pub fn new_id(kind: NodeKind) -> String {
    format!("{}-{}", kind.prefix(), Uuid::new_v4().simple())
}

/// A single actionable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_completed")]
    pub completed: bool,
}

impl Task {
    /// Creates an incomplete task with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(NodeKind::Task),
            title: title.into(),
            completed: false,
        }
    }

    /// Creates an incomplete task with a caller-chosen id
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Day {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Day number as written in the source text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

impl Day {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(NodeKind::Day),
            title: title.into(),
            tasks: Vec::new(),
            number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Week {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

impl Week {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(NodeKind::Week),
            title: title.into(),
            days: Vec::new(),
            number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Month {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub weeks: Vec<Week>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

impl Month {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(NodeKind::Month),
            title: title.into(),
            weeks: Vec::new(),
            number: None,
        }
    }
}

/// A goal roadmap: months, each split into weeks, days and tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub months: Vec<Month>,
}

/// Anything in the tree that carries an id
pub trait Node {
    fn id(&self) -> &str;
}

impl Node for Month {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Node for Week {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Node for Day {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Node for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Addresses one node among its siblings, either by position or by id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Index(usize),
    Id(String),
}

impl NodeRef {
    fn resolve<T: Node>(&self, nodes: &[T]) -> Option<usize> {
        match self {
            NodeRef::Index(i) if *i < nodes.len() => Some(*i),
            NodeRef::Index(_) => None,
            NodeRef::Id(id) => nodes.iter().position(|n| n.id() == id),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Index(i) => write!(f, "{}", i),
            NodeRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Full path to a task: month, week, day and task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskCoord {
    pub month: NodeRef,
    pub week: NodeRef,
    pub day: NodeRef,
    pub task: NodeRef,
}

impl TaskCoord {
    /// Coordinate made of positions only
    pub fn at(month: usize, week: usize, day: usize, task: usize) -> Self {
        Self {
            month: NodeRef::Index(month),
            week: NodeRef::Index(week),
            day: NodeRef::Index(day),
            task: NodeRef::Index(task),
        }
    }
}

impl fmt::Display for TaskCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.month, self.week, self.day, self.task)
    }
}

/// Parses a coordinate string such as "0,1,2,0" or "month-a,week-b,2,task-c"
///
/// Numeric parts are positions, anything else is treated as an id.
pub fn parse_coord(coord: &str) -> Result<TaskCoord, PlanError> {
    let parts: Vec<NodeRef> = coord
        .split(',')
        .map(|s| s.trim())
        .map(|s| match s.parse::<usize>() {
            Ok(i) => NodeRef::Index(i),
            Err(_) => NodeRef::Id(s.to_string()),
        })
        .collect();

    if parts.len() != 4 || parts.iter().any(|p| matches!(p, NodeRef::Id(id) if id.is_empty())) {
        return Err(PlanError::InvalidCoord(coord.to_string()));
    }

    let mut parts = parts.into_iter();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(month), Some(week), Some(day), Some(task)) => Ok(TaskCoord {
            month,
            week,
            day,
            task,
        }),
        _ => Err(PlanError::InvalidCoord(coord.to_string())),
    }
}

/// Task completion counts for a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    /// Rounded to the nearest whole percent, 0 when there are no tasks
    pub percent: u8,
}

impl Plan {
    /// Creates an empty plan for the given goal
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            months: Vec::new(),
        }
    }

    /// Iterates over every task in tree order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.months
            .iter()
            .flat_map(|m| m.weeks.iter())
            .flat_map(|w| w.days.iter())
            .flat_map(|d| d.tasks.iter())
    }

    pub fn day_count(&self) -> usize {
        self.months
            .iter()
            .flat_map(|m| m.weeks.iter())
            .map(|w| w.days.len())
            .sum()
    }

    pub fn progress(&self) -> Progress {
        let (total, completed) = self.tasks().fold((0, 0), |(total, done), task| {
            (total + 1, done + usize::from(task.completed))
        });

        let percent = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        } else {
            0
        };

        Progress {
            total,
            completed,
            percent,
        }
    }

    /// Returns the task at the given coordinate
    pub fn task(&self, coord: &TaskCoord) -> Option<&Task> {
        let month = &self.months[coord.month.resolve(&self.months)?];
        let week = &month.weeks[coord.week.resolve(&month.weeks)?];
        let day = &week.days[coord.day.resolve(&week.days)?];
        let index = coord.task.resolve(&day.tasks)?;
        day.tasks.get(index)
    }

    fn task_mut(&mut self, coord: &TaskCoord) -> Option<&mut Task> {
        let m = coord.month.resolve(&self.months)?;
        let month = &mut self.months[m];
        let w = coord.week.resolve(&month.weeks)?;
        let week = &mut month.weeks[w];
        let d = coord.day.resolve(&week.days)?;
        let day = &mut week.days[d];
        let t = coord.task.resolve(&day.tasks)?;
        day.tasks.get_mut(t)
    }

    /// Finds the positional coordinate of the task with the given id
    pub fn locate_task(&self, task_id: &str) -> Option<TaskCoord> {
        for (m, month) in self.months.iter().enumerate() {
            for (w, week) in month.weeks.iter().enumerate() {
                for (d, day) in week.days.iter().enumerate() {
                    if let Some(t) = day.tasks.iter().position(|t| t.id == task_id) {
                        return Some(TaskCoord::at(m, w, d, t));
                    }
                }
            }
        }
        None
    }

    /// Returns a copy of this plan with the completion flag of one task flipped
    ///
    /// The receiver is left untouched; callers persist the returned tree whole.
    pub fn toggled(&self, coord: &TaskCoord) -> Result<Plan, PlanError> {
        let mut next = self.clone();
        let task = next
            .task_mut(coord)
            .ok_or_else(|| PlanError::TaskNotFound(coord.to_string()))?;
        task.completed = !task.completed;
        Ok(next)
    }
}

/// Errors surfaced by plan operations
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("goal is required")]
    MissingGoal,

    #[error("goal must be {max} characters or less")]
    GoalTooLong { max: usize },

    #[error("message is required")]
    MissingMessage,

    #[error("plan not found: {0}")]
    PlanNotFound(PlanKey),

    #[error("task not found at {0}")]
    TaskNotFound(String),

    #[error("invalid task coordinate '{0}': expected month,week,day,task")]
    InvalidCoord(String),

    #[error("a plan is already being generated for user '{0}'")]
    Busy(String),

    #[error("generation failed: {0}")]
    Generation(#[from] crate::generator::GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        let mut plan = Plan::new("Learn Rust");
        let mut month = Month::new("Month 1");
        let mut week = Week::new("Week 1");
        let mut day = Day::new("Day 1");
        day.tasks.push(Task::with_id("task-a", "Read the book"));
        day.tasks.push(Task::with_id("task-b", "Write a CLI"));
        week.days.push(day);
        month.weeks.push(week);
        plan.months.push(month);
        plan
    }

    #[test]
    fn test_new_id_has_kind_prefix() {
        let id = new_id(NodeKind::Week);
        assert!(id.starts_with("week-"));
        assert_ne!(id, new_id(NodeKind::Week));
    }

    #[test]
    fn test_toggle_by_index_leaves_original_untouched() {
        let plan = sample_plan();
        let toggled = plan.toggled(&TaskCoord::at(0, 0, 0, 1)).unwrap();

        assert!(toggled.months[0].weeks[0].days[0].tasks[1].completed);
        assert!(!plan.months[0].weeks[0].days[0].tasks[1].completed);

        let back = toggled.toggled(&TaskCoord::at(0, 0, 0, 1)).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_toggle_by_id() {
        let plan = sample_plan();
        let month_id = plan.months[0].id.clone();
        let coord = TaskCoord {
            month: NodeRef::Id(month_id),
            week: NodeRef::Index(0),
            day: NodeRef::Index(0),
            task: NodeRef::Id("task-a".to_string()),
        };

        let toggled = plan.toggled(&coord).unwrap();
        assert!(toggled.task(&coord).unwrap().completed);
    }

    #[test]
    fn test_toggle_missing_task() {
        let plan = sample_plan();
        let err = plan.toggled(&TaskCoord::at(0, 0, 0, 5)).unwrap_err();
        assert!(matches!(err, PlanError::TaskNotFound(_)));
    }

    #[test]
    fn test_locate_task() {
        let plan = sample_plan();
        assert_eq!(plan.locate_task("task-b"), Some(TaskCoord::at(0, 0, 0, 1)));
        assert_eq!(plan.locate_task("nope"), None);
    }

    #[test]
    fn test_parse_coord() {
        assert_eq!(parse_coord("0, 1,2,3").unwrap(), TaskCoord::at(0, 1, 2, 3));

        let coord = parse_coord("month-x,1,day-y,task-z").unwrap();
        assert_eq!(coord.month, NodeRef::Id("month-x".to_string()));
        assert_eq!(coord.week, NodeRef::Index(1));

        assert!(parse_coord("0,1,2").is_err());
        assert!(parse_coord("0,,1,2").is_err());
    }

    #[test]
    fn test_progress() {
        let plan = sample_plan();
        assert_eq!(
            plan.progress(),
            Progress {
                total: 2,
                completed: 0,
                percent: 0
            }
        );

        let plan = plan.toggled(&TaskCoord::at(0, 0, 0, 0)).unwrap();
        assert_eq!(plan.progress().percent, 50);
        assert_eq!(Plan::new("empty").progress().percent, 0);
    }

    #[test]
    fn test_node_ref_deserializes_untagged() {
        let coord: TaskCoord = serde_json::from_str(
            r#"{"month": 0, "week": "week-1", "day": 2, "task": "task-9"}"#,
        )
        .unwrap();
        assert_eq!(coord.month, NodeRef::Index(0));
        assert_eq!(coord.week, NodeRef::Id("week-1".to_string()));
    }
}
