//! Plan normalization
//!
//! Every plan that leaves the parsing pipeline, and every plan read back from
//! storage, goes through [`normalize`]. It backfills missing ids and blank
//! titles positionally and is idempotent: a normalized plan comes back
//! unchanged.
//!
//! Loose JSON is converted with [`plan_from_loose`], which tolerates missing or
//! mistyped fields (non-array children become empty, non-string titles become
//! blank) and coerces completion flags with [`coerce_completed`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{new_id, Day, Month, NodeKind, Plan, Task, Week};

/// Coerces a loosely typed completion flag into a strict boolean
///
/// `true`, any non-zero number and the strings "true", "1" and "yes"
/// (trimmed, case-insensitive) are complete. Everything else is not.
pub fn coerce_completed(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => false,
    }
}

pub(crate) fn deserialize_completed<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_completed(&value))
}

/// Fills in missing ids and blank titles throughout the tree
pub fn normalize(mut plan: Plan) -> Plan {
    for (m, month) in plan.months.iter_mut().enumerate() {
        backfill(&mut month.id, &mut month.title, NodeKind::Month, m);
        for (w, week) in month.weeks.iter_mut().enumerate() {
            backfill(&mut week.id, &mut week.title, NodeKind::Week, w);
            for (d, day) in week.days.iter_mut().enumerate() {
                backfill(&mut day.id, &mut day.title, NodeKind::Day, d);
                for (t, task) in day.tasks.iter_mut().enumerate() {
                    backfill(&mut task.id, &mut task.title, NodeKind::Task, t);
                }
            }
        }
    }
    plan
}

fn backfill(id: &mut String, title: &mut String, kind: NodeKind, position: usize) {
    if id.trim().is_empty() {
        *id = new_id(kind);
    }
    if title.trim().is_empty() {
        *title = kind.default_title(position + 1);
    }
}

/// Converts loose JSON into a normalized plan
///
/// This is the load path for stored plans.
pub fn plan_from_value(value: &Value, fallback_goal: &str) -> Plan {
    normalize(plan_from_loose(value, fallback_goal))
}

/// Converts loose JSON into a plan without backfilling anything
///
/// The goal is taken from the value when it is a non-blank string.
pub fn plan_from_loose(value: &Value, fallback_goal: &str) -> Plan {
    let goal = match value.get("goal").and_then(Value::as_str) {
        Some(goal) if !goal.trim().is_empty() => goal.to_string(),
        _ => fallback_goal.to_string(),
    };

    Plan {
        goal,
        months: children(value, "months").iter().map(month_from_loose).collect(),
    }
}

pub(crate) fn month_from_loose(value: &Value) -> Month {
    Month {
        id: text(value, "id"),
        title: text(value, "title"),
        weeks: children(value, "weeks").iter().map(week_from_loose).collect(),
        number: number(value),
    }
}

pub(crate) fn week_from_loose(value: &Value) -> Week {
    Week {
        id: text(value, "id"),
        title: text(value, "title"),
        days: children(value, "days").iter().map(day_from_loose).collect(),
        number: number(value),
    }
}

pub(crate) fn day_from_loose(value: &Value) -> Day {
    Day {
        id: text(value, "id"),
        title: text(value, "title"),
        tasks: children(value, "tasks").iter().map(task_from_loose).collect(),
        number: number(value),
    }
}

pub(crate) fn task_from_loose(value: &Value) -> Task {
    // Bare strings show up in model output as task lists
    if let Value::String(title) = value {
        return Task {
            id: String::new(),
            title: title.clone(),
            completed: false,
        };
    }

    Task {
        id: text(value, "id"),
        title: text(value, "title"),
        completed: value.get("completed").map(coerce_completed).unwrap_or(false),
    }
}

fn children<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn number(value: &Value) -> Option<u32> {
    value
        .get("number")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_coerce_completed() {
        assert!(coerce_completed(&json!(true)));
        assert!(coerce_completed(&json!(1)));
        assert!(coerce_completed(&json!(0.5)));
        assert!(coerce_completed(&json!("TRUE")));
        assert!(coerce_completed(&json!(" yes ")));
        assert!(coerce_completed(&json!("1")));

        assert!(!coerce_completed(&json!(false)));
        assert!(!coerce_completed(&json!("false")));
        assert!(!coerce_completed(&json!("no")));
        assert!(!coerce_completed(&json!(0)));
        assert!(!coerce_completed(&json!(null)));
        assert!(!coerce_completed(&json!({})));
        assert!(!coerce_completed(&json!([true])));
    }

    #[test]
    fn test_loose_children_default_to_empty() {
        let plan = plan_from_value(
            &json!({
                "months": [
                    {"title": "M", "weeks": "oops"},
                    {"weeks": [{"days": [{"tasks": null}]}]}
                ]
            }),
            "Goal",
        );

        assert_eq!(plan.goal, "Goal");
        assert_eq!(plan.months.len(), 2);
        assert!(plan.months[0].weeks.is_empty());
        assert_eq!(plan.months[1].title, "Month 2");
        assert_eq!(plan.months[1].weeks[0].title, "Week 1");
        assert!(plan.months[1].weeks[0].days[0].tasks.is_empty());
    }

    #[test]
    fn test_backfill_titles_and_ids() {
        let plan = plan_from_value(
            &json!({
                "goal": "Ship it",
                "months": [{"weeks": [{"days": [{"tasks": [
                    {"title": "", "completed": "yes"},
                    "write tests"
                ]}]}]}]
            }),
            "ignored",
        );

        assert_eq!(plan.goal, "Ship it");
        let day = &plan.months[0].weeks[0].days[0];
        assert_eq!(day.title, "Day 1");
        assert_eq!(day.tasks[0].title, "Task 1");
        assert!(day.tasks[0].completed);
        assert_eq!(day.tasks[1].title, "write tests");
        assert!(day.tasks.iter().all(|t| t.id.starts_with("task-")));
        assert!(plan.months[0].id.starts_with("month-"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = plan_from_value(
            &json!({"months": [{"id": "", "title": " ", "weeks": [{"days": [{}]}]}]}),
            "Goal",
        );
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_ids_are_kept() {
        let plan = plan_from_value(
            &json!({"months": [{"id": "keep-me", "title": "Mine", "number": 4}]}),
            "Goal",
        );
        assert_eq!(plan.months[0].id, "keep-me");
        assert_eq!(plan.months[0].title, "Mine");
        assert_eq!(plan.months[0].number, Some(4));
    }

    #[test]
    fn test_typed_deserialize_coerces_completed() {
        let task: Task =
            serde_json::from_value(json!({"id": "t", "title": "x", "completed": "false"}))
                .unwrap();
        assert!(!task.completed);

        let task: Task =
            serde_json::from_value(json!({"id": "t", "title": "x", "completed": 1})).unwrap();
        assert!(task.completed);
    }
}
