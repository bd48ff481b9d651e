//! Improvement suggestions
//!
//! The generator is asked to answer with blocks like:
//!
//! ```text
//! TYPE: schedule
//! TITLE: Add rest days
//! DESCRIPTION: Two heavy weeks back to back risk burnout.
//! PRIORITY: high
//! ```
//!
//! A new `TYPE:` line starts a new suggestion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
}

#[derive(Default)]
struct Partial {
    kind: Option<String>,
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
}

impl Partial {
    fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
    }

    fn finish(self) -> Suggestion {
        Suggestion {
            kind: self.kind.unwrap_or_else(|| "general".to_string()),
            title: self
                .title
                .unwrap_or_else(|| "Improvement suggestion".to_string()),
            description: self
                .description
                .unwrap_or_else(|| "No description provided".to_string()),
            priority: self.priority.unwrap_or_else(|| "medium".to_string()),
        }
    }
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key).map(str::trim)
}

/// Parses suggestion blocks out of a generator reply
pub fn parse_suggestions(text: &str) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    let mut current = Partial::default();

    for line in text.lines().map(str::trim) {
        if let Some(kind) = field(line, "TYPE:") {
            if !current.is_empty() {
                suggestions.push(std::mem::take(&mut current).finish());
            }
            current.kind = Some(kind.to_lowercase());
        } else if let Some(title) = field(line, "TITLE:") {
            current.title = Some(title.to_string());
        } else if let Some(description) = field(line, "DESCRIPTION:") {
            current.description = Some(description.to_string());
        } else if let Some(priority) = field(line, "PRIORITY:") {
            current.priority = Some(priority.to_lowercase());
        }
    }

    if !current.is_empty() {
        suggestions.push(current.finish());
    }
    suggestions
}
