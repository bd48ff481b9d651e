//! Structure repair
//!
//! Turns whatever JSON the generator produced into a plan. A value with a
//! `months` array passes through. A value with only a `weeks` array is a
//! fragment: its weeks are cleaned up, padded to twelve with synthesized weeks
//! and split into three months. Anything else yields an empty plan.

use serde_json::Value;
use tracing::debug;

use crate::models::{new_id, Day, Month, NodeKind, Plan, Task, Week};
use crate::normalize::{plan_from_loose, week_from_loose};

pub const MONTHS_PER_PLAN: usize = 3;
pub const WEEKS_PER_MONTH: usize = 4;
pub const DAYS_PER_WEEK: usize = 7;

/// Titles used when a fragment is regrouped into months
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairConfig {
    pub month_titles: [String; MONTHS_PER_PLAN],
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            month_titles: [
                "Month 1: Academic Foundations and Skill Enhancement".to_string(),
                "Month 2: Implementation and Progress".to_string(),
                "Month 3: Refinement and Completion".to_string(),
            ],
        }
    }
}

/// The three stages a synthesized week can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Foundation,
    Implementation,
    Completion,
}

impl Phase {
    /// Phase of a 1-based week number
    pub fn for_week(week_number: usize) -> Self {
        match week_number {
            0..=4 => Phase::Foundation,
            5..=8 => Phase::Implementation,
            _ => Phase::Completion,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Foundation => "Foundation",
            Phase::Implementation => "Implementation",
            Phase::Completion => "Completion",
        }
    }

    /// The two tasks for a day of a synthesized week, `day_index` is 0-based
    fn day_tasks(&self, day_index: usize, goal: &str) -> [String; 2] {
        let pair = |a: &str, b: &str| [a.to_string(), b.to_string()];
        match (self, day_index) {
            (Phase::Foundation, 5) => pair(
                "Weekend review: Reflect on initial progress",
                "Take time for self-care and balance",
            ),
            (Phase::Foundation, 6) => pair(
                "Plan for the upcoming week's learning objectives",
                "Prepare materials for next week",
            ),
            (Phase::Foundation, _) => [
                format!("Academic foundation building for {}", goal),
                "Review new concepts and strengthen understanding".to_string(),
            ],
            (Phase::Implementation, 5) => pair(
                "Weekend review: Reflect on progress made during the week",
                "Take time for self-care and maintain work-life balance",
            ),
            (Phase::Implementation, 6) => pair(
                "Plan for the upcoming week and organize resources",
                "Prepare mentally for the next week's challenges",
            ),
            (Phase::Implementation, _) => [
                format!("Continue implementation of goal for {}", goal),
                "Review progress and adjust approach if needed".to_string(),
            ],
            (Phase::Completion, 5) => pair(
                "Final weekend review: Assess overall progress toward goal",
                "Reflect on lessons learned throughout the 90-day journey",
            ),
            (Phase::Completion, 6) => pair(
                "Prepare presentation or documentation of achievements",
                "Set future goals based on this 90-day experience",
            ),
            (Phase::Completion, _) => [
                format!("Finalize remaining steps for {}", goal),
                "Document progress and achievements".to_string(),
            ],
        }
    }
}

/// Repairs a candidate value using the default month titles
pub fn repair(candidate: &Value, fallback_goal: &str) -> Plan {
    repair_with(candidate, fallback_goal, &RepairConfig::default())
}

pub fn repair_with(candidate: &Value, fallback_goal: &str, config: &RepairConfig) -> Plan {
    if candidate.get("months").is_some_and(Value::is_array) {
        return plan_from_loose(candidate, fallback_goal);
    }

    let Some(fragment) = candidate.get("weeks").and_then(Value::as_array) else {
        debug!("Nothing to repair: no months or weeks array");
        return Plan::new(fallback_goal);
    };

    debug!("Repairing fragment with {} weeks", fragment.len());
    let target_weeks = MONTHS_PER_PLAN * WEEKS_PER_MONTH;

    let mut weeks: Vec<Week> = fragment
        .iter()
        .take(target_weeks)
        .enumerate()
        .map(|(i, value)| repair_week(value, i, fallback_goal))
        .collect();

    while weeks.len() < target_weeks {
        let week_number = weeks.len() + 1;
        weeks.push(synthesize_week(week_number, fallback_goal));
    }

    let mut weeks = weeks.into_iter();
    let months = config
        .month_titles
        .iter()
        .map(|title| Month {
            id: new_id(NodeKind::Month),
            title: title.clone(),
            weeks: weeks.by_ref().take(WEEKS_PER_MONTH).collect(),
            number: None,
        })
        .collect();

    Plan {
        goal: fallback_goal.to_string(),
        months,
    }
}

/// Cleans up one week the generator did produce
fn repair_week(value: &Value, position: usize, goal: &str) -> Week {
    let mut week = week_from_loose(value);
    if week.id.trim().is_empty() {
        week.id = new_id(NodeKind::Week);
    }
    if week.title.trim().is_empty() {
        week.title = NodeKind::Week.default_title(position + 1);
    }

    week.days.truncate(DAYS_PER_WEEK);
    for (d, day) in week.days.iter_mut().enumerate() {
        if day.id.trim().is_empty() {
            day.id = new_id(NodeKind::Day);
        }
        if day.title.trim().is_empty() {
            day.title = NodeKind::Day.default_title(d + 1);
        }
        if day.tasks.is_empty() {
            day.tasks.push(Task::new(format!("Task for {}", goal)));
        }
    }

    while week.days.len() < DAYS_PER_WEEK {
        let mut day = Day::new(NodeKind::Day.default_title(week.days.len() + 1));
        day.tasks.push(Task::new(format!("Task for {}", goal)));
        week.days.push(day);
    }

    week
}

/// Builds a full week for a slot the generator left empty
fn synthesize_week(week_number: usize, goal: &str) -> Week {
    let phase = Phase::for_week(week_number);
    let within_month = match week_number % WEEKS_PER_MONTH {
        0 => WEEKS_PER_MONTH,
        n => n,
    };

    let mut week = Week::new(format!(
        "Week {}: {} Phase {}",
        week_number,
        phase.name(),
        within_month
    ));
    week.days = (0..DAYS_PER_WEEK)
        .map(|d| {
            let mut day = Day::new(NodeKind::Day.default_title(d + 1));
            day.tasks = phase
                .day_tasks(d, goal)
                .into_iter()
                .map(Task::new)
                .collect();
            day
        })
        .collect();
    week
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_full_shape(plan: &Plan) {
        assert_eq!(plan.months.len(), MONTHS_PER_PLAN);
        for month in &plan.months {
            assert_eq!(month.weeks.len(), WEEKS_PER_MONTH);
            for week in &month.weeks {
                assert_eq!(week.days.len(), DAYS_PER_WEEK);
                for day in &week.days {
                    assert!(!day.tasks.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_months_pass_through() {
        let plan = repair(
            &json!({"goal": "Own goal", "months": [{"title": "Only month"}]}),
            "Fallback",
        );
        assert_eq!(plan.goal, "Own goal");
        assert_eq!(plan.months.len(), 1);
        assert_eq!(plan.months[0].title, "Only month");
        assert!(plan.months[0].weeks.is_empty());
    }

    #[test]
    fn test_empty_fragment_becomes_full_plan() {
        let plan = repair(&json!({"weeks": []}), "Learn piano");

        assert_full_shape(&plan);
        assert_eq!(plan.goal, "Learn piano");
        assert_eq!(
            plan.months[0].title,
            "Month 1: Academic Foundations and Skill Enhancement"
        );
        assert_eq!(plan.months[2].title, "Month 3: Refinement and Completion");
        assert_eq!(
            plan.months[0].weeks[0].title,
            "Week 1: Foundation Phase 1"
        );
        assert_eq!(
            plan.months[1].weeks[3].title,
            "Week 8: Implementation Phase 4"
        );
        assert_eq!(plan.months[2].weeks[0].title, "Week 9: Completion Phase 1");

        let first_day = &plan.months[0].weeks[0].days[0];
        assert_eq!(first_day.tasks.len(), 2);
        assert_eq!(
            first_day.tasks[0].title,
            "Academic foundation building for Learn piano"
        );
        assert!(plan.months[0].weeks[0].days[5].tasks[0]
            .title
            .starts_with("Weekend review"));
        assert!(plan.tasks().all(|t| !t.completed));
    }

    #[test]
    fn test_fragment_weeks_are_kept_and_padded() {
        let plan = repair(
            &json!({"weeks": [
                {"title": "My week", "days": [
                    {"title": "Mon", "tasks": [{"title": "Stretch", "completed": "true"}]},
                    {"title": "Tue", "tasks": []}
                ]},
                {"days": "not an array"}
            ]}),
            "Run",
        );

        assert_full_shape(&plan);
        let first = &plan.months[0].weeks[0];
        assert_eq!(first.title, "My week");
        assert_eq!(first.days[0].tasks[0].title, "Stretch");
        assert!(first.days[0].tasks[0].completed);
        assert_eq!(first.days[1].tasks[0].title, "Task for Run");
        assert_eq!(first.days[6].title, "Day 7");

        let second = &plan.months[0].weeks[1];
        assert_eq!(second.title, "Week 2");
        assert!(second.days.iter().all(|d| d.tasks.len() == 1));

        assert_eq!(plan.months[0].weeks[2].title, "Week 3: Foundation Phase 3");
    }

    #[test]
    fn test_fragment_extra_days_and_weeks_are_dropped() {
        let days: Vec<Value> = (0..10).map(|i| json!({"title": format!("D{}", i)})).collect();
        let weeks: Vec<Value> = (0..15).map(|_| json!({"days": days})).collect();
        let plan = repair(&json!({ "weeks": weeks }), "G");

        assert_full_shape(&plan);
        assert_eq!(plan.months[2].weeks[3].title, "Week 12");
        assert_eq!(plan.months[0].weeks[0].days[6].title, "D6");
    }

    #[test]
    fn test_repair_is_total() {
        for candidate in [
            json!({}),
            json!(null),
            json!([1, 2, 3]),
            json!("text"),
            json!(42),
            json!({"months": "nope", "weeks": {"a": 1}}),
            json!({"data": {"months": [{"weeks": [[[]]]}]}}),
        ] {
            let plan = repair(&candidate, "G");
            assert_eq!(plan.goal, "G");
            assert!(plan.months.is_empty());
        }
    }

    #[test]
    fn test_custom_month_titles() {
        let config = RepairConfig {
            month_titles: ["A".to_string(), "B".to_string(), "C".to_string()],
        };
        let plan = repair_with(&json!({"weeks": []}), "G", &config);
        let titles: Vec<&str> = plan.months.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(Phase::for_week(4), Phase::Foundation);
        assert_eq!(Phase::for_week(5), Phase::Implementation);
        assert_eq!(Phase::for_week(8), Phase::Implementation);
        assert_eq!(Phase::for_week(9), Phase::Completion);
    }
}
