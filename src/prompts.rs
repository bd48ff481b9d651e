//! Prompts sent to the plan generator

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Plan;

/// Output format the generator is asked to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlanFormat {
    #[default]
    Markdown,
    Json,
}

pub const PLANNER_SYSTEM_PROMPT: &str = "You are an expert project planner.";

/// Appended to chat messages when the user already has a plan
pub const FORMAT_REMINDER: &str = "\n\n[SYSTEM REMINDER: If you are updating the plan based on this message, your response MUST be ONLY the complete, revised plan in the required Markdown format, starting directly with \"# Goal:\". NO other text is allowed.]";

/// Builds the user prompt asking for a 90-day plan
pub fn plan_prompt(goal: &str, format: PlanFormat) -> String {
    match format {
        PlanFormat::Markdown => markdown_plan_prompt(goal),
        PlanFormat::Json => json_plan_prompt(goal),
    }
}

fn markdown_plan_prompt(goal: &str) -> String {
    format!(
        r#"Create a detailed, actionable 90-day plan to achieve the following goal:
"{goal}"

Structure the plan rigorously using the following Markdown format:

# Goal: [Restate the goal here]

## Month 1: [Concise milestone title for Month 1]
### Week 1: [Objective title for Week 1 of Month 1]
- Day 1: [Specific, actionable task for Day 1]
- Day 2: [Specific, actionable task for Day 2]
- Day 3: [Specific, actionable task for Day 3]
- Day 4: [Specific, actionable task for Day 4]
- Day 5: [Specific, actionable task for Day 5]
- Day 6: [Specific, actionable task for Day 6]
- Day 7: [Specific, actionable task for Day 7]
### Week 2: [Objective title for Week 2 of Month 1]
... (repeat for all 7 days, then weeks 3 and 4)

## Month 2: [Concise milestone title for Month 2]
... (repeat the structure for 4 weeks of 7 days)

## Month 3: [Concise milestone title for Month 3]
... (repeat the structure for 4 weeks of 7 days)

Make sure every day of every week has a task. Use the exact headings (# Goal:, ## Month <number>:, ### Week <number>:, - Day <number>:) as shown."#
    )
}

fn json_plan_prompt(goal: &str) -> String {
    format!(
        r#"Generate a structured 90-day plan for the following goal: "{goal}"

The plan must include three months with a unique title each, four weeks per month with a specific focus, and daily tasks for every day of every week.

Your response MUST contain ONLY valid JSON. Do not include any text before or after the JSON and do not wrap it in code fences.

The JSON object must have this structure:
{{
  "months": [
    {{
      "title": "Month 1: [DESCRIPTIVE TITLE]",
      "weeks": [
        {{
          "title": "Week 1: [SPECIFIC FOCUS]",
          "days": [
            {{"title": "Monday", "tasks": [{{"title": "Specific task description", "completed": false}}]}}
          ]
        }}
      ]
    }}
  ]
}}

Month titles follow the 'Month X: Name' form, like 'Month 1: Foundation Building'. Week titles follow the 'Week X: Focus' form, like 'Week 1: Getting Started'. Make every task specific and tailored to the goal."#
    )
}

/// System prompt for chat, with the current plan as context when there is one
pub fn chat_system_prompt(plan: Option<&Plan>) -> String {
    let Some(plan) = plan else {
        return "You are a helpful assistant helping a user define a 90-day goal. Ask clarifying questions if the goal is unclear, otherwise confirm you understand.".to_string();
    };

    let plan_json = match serde_json::to_string_pretty(plan) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize plan for chat context: {}", e);
            return "You are a helpful assistant. The user has a 90-day plan, but it could not be included here. Answer the user's questions.".to_string();
        }
    };

    format!(
        r##"You are an AI assistant supporting a user with their 90-day plan.
CONTEXT:
Here is their current plan structure:
{plan_json}

TASK:
Review the user's latest message in the context of the chat history and the plan above.
1. If the user asks a question or makes a comment that does not require changing the plan, respond conversationally.
2. If the user asks to modify the plan, your response MUST contain ONLY the complete, revised 90-day plan, with no text before or after it. The response MUST start with "# Goal:" and follow this Markdown structure, with a task on every day:

# Goal: [Goal title]

## Month 1: [Milestone title]
### Week 1: [Objective title]
- Day 1: [Task description]
- Day 2: [Task description]
...
(Repeat for all months, weeks and days)"##
    )
}

/// Prompt asking for improvement suggestions on a plan
pub fn suggestions_prompt(plan: &Plan) -> String {
    let months: Vec<&str> = plan.months.iter().map(|m| m.title.as_str()).collect();
    let progress = plan.progress();

    format!(
        r#"Analyze the following 90-day plan and provide 3-5 specific, actionable suggestions for improvement.

GOAL: {goal}
MILESTONES: {milestones}
PROGRESS: {completed} of {total} tasks completed

Provide each suggestion in this format:
TYPE: [milestone/timeline/task/general]
TITLE: [Brief title]
DESCRIPTION: [Detailed description of the suggestion]
PRIORITY: [high/medium/low]

Focus on practical improvements that would increase the likelihood of success."#,
        goal = plan.goal,
        milestones = months.join(", "),
        completed = progress.completed,
        total = progress.total,
    )
}
