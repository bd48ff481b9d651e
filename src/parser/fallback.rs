//! Fallback plan
//!
//! Used whenever the generator fails or its output cannot be structured. The
//! result is fully deterministic, ids included.

use crate::models::{Day, Month, Plan, Task, Week};
use crate::parser::repair::{DAYS_PER_WEEK, MONTHS_PER_PLAN, WEEKS_PER_MONTH};

fn month_tasks(month: usize, goal: &str) -> [String; 2] {
    match month {
        0 => [
            format!("Planning task for {}", goal),
            "Research resources and tools needed".to_string(),
        ],
        1 => [
            "Continue working toward goal".to_string(),
            "Review progress and adjust approach if needed".to_string(),
        ],
        _ => [
            "Final steps toward completing goal".to_string(),
            "Document lessons learned and achievements".to_string(),
        ],
    }
}

/// Builds a 3 month by 4 week by 7 day plan with two tasks a day
pub fn fallback_plan(goal: &str) -> Plan {
    let months = (0..MONTHS_PER_PLAN)
        .map(|m| Month {
            id: format!("month-{}", m),
            title: format!("Month {}", m + 1),
            number: None,
            weeks: (0..WEEKS_PER_MONTH)
                .map(|w| Week {
                    id: format!("week-{}-{}", m, w),
                    title: format!("Week {}", w + 1),
                    number: None,
                    days: (0..DAYS_PER_WEEK)
                        .map(|d| Day {
                            id: format!("day-{}-{}-{}", m, w, d),
                            title: format!("Day {}", d + 1),
                            number: None,
                            tasks: month_tasks(m, goal)
                                .into_iter()
                                .enumerate()
                                .map(|(t, title)| {
                                    Task::with_id(format!("task-{}-{}-{}-{}", m, w, d, t), title)
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Plan {
        goal: goal.to_string(),
        months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fallback_shape() {
        let plan = fallback_plan("Run a marathon");

        assert_eq!(plan.goal, "Run a marathon");
        assert_eq!(plan.months.len(), 3);
        assert_eq!(plan.day_count(), 84);
        assert_eq!(plan.tasks().count(), 168);
        assert!(plan.tasks().all(|t| !t.completed));

        let day = &plan.months[0].weeks[0].days[0];
        assert_eq!(day.tasks[0].title, "Planning task for Run a marathon");
        assert_eq!(plan.months[2].weeks[3].days[6].tasks[1].id, "task-2-3-6-1");
        assert_eq!(plan.months[1].weeks[2].id, "week-1-2");
        assert_eq!(plan.months[1].title, "Month 2");
    }

    #[test]
    fn test_fallback_is_deterministic_and_normalized() {
        let plan = fallback_plan("G");
        assert_eq!(plan, fallback_plan("G"));
        assert_eq!(normalize(plan.clone()), plan);
    }
}
