//! Plan parsing pipeline
//!
//! Raw generator output is interpreted in order:
//!
//! 1. JSON with a non-empty `months` array is accepted as is.
//! 2. JSON with a `weeks` array is repaired into a full three month plan.
//! 3. Markdown headings are parsed.
//! 4. Otherwise the fallback plan is used.
//!
//! Every path ends in [`normalize`], so the returned tree always has ids and
//! titles on every node.

pub mod extract;
pub mod fallback;
pub mod markdown;
pub mod repair;
pub mod suggestions;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::Plan;
use crate::normalize::{normalize, plan_from_loose};

pub use extract::{extract_json, extract_markdown_plan};
pub use fallback::fallback_plan;
pub use repair::{repair, repair_with, RepairConfig};
pub use suggestions::{parse_suggestions, Suggestion};

pub const UNPARSEABLE_NOTICE: &str =
    "I couldn't structure the generated plan, so I've created a basic plan template for you to get started.";

/// Which path produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Json,
    Repaired,
    Markdown,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub source: PlanSource,
    /// Set when the user should be told the plan is a template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl PlanOutcome {
    fn new(plan: Plan, source: PlanSource) -> Self {
        Self {
            plan: normalize(plan),
            source,
            notice: None,
        }
    }

    /// A fallback plan for `goal` carrying an explanation for the user
    pub fn fallback(goal: &str, notice: impl Into<String>) -> Self {
        Self {
            plan: fallback_plan(goal),
            source: PlanSource::Fallback,
            notice: Some(notice.into()),
        }
    }
}

/// Interprets raw generator output using the default repair settings
pub fn interpret(raw: &str, goal: &str) -> PlanOutcome {
    interpret_with(raw, goal, &RepairConfig::default())
}

pub fn interpret_with(raw: &str, goal: &str, config: &RepairConfig) -> PlanOutcome {
    if let Some(value) = extract_json(raw) {
        if has_months(&value) {
            debug!("Using JSON plan from generator output");
            let mut plan = plan_from_loose(&value, goal);
            plan.goal = goal.to_string();
            return PlanOutcome::new(plan, PlanSource::Json);
        }

        let repaired = repair_with(&value, goal, config);
        if !repaired.months.is_empty() {
            debug!("Repaired partial JSON plan from generator output");
            return PlanOutcome::new(repaired, PlanSource::Repaired);
        }
    }

    if let Some(plan) = markdown::parse(raw, goal) {
        debug!("Using Markdown plan from generator output");
        return PlanOutcome::new(plan, PlanSource::Markdown);
    }

    warn!("Generator output could not be structured, using fallback plan");
    PlanOutcome::fallback(goal, UNPARSEABLE_NOTICE)
}

fn has_months(value: &Value) -> bool {
    value
        .get("months")
        .and_then(Value::as_array)
        .is_some_and(|months| !months.is_empty())
}
