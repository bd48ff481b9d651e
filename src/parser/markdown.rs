//! Markdown plan parser
//!
//! Reads the heading/list layout the generator is asked to produce:
//!
//! ```text
//! # Goal: Learn Rust
//! ## Month 1: Foundations
//! ### Week 1: Setup
//! - Day 1: Install the toolchain
//! - Read chapter one
//! ```
//!
//! Lines are handled one at a time by a small state machine. Anything that is
//! not a month heading, week heading or bullet is ignored.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{Day, Month, Plan, Task, Week};
use crate::normalize::normalize;

lazy_static! {
    static ref MONTH_HEADING: Regex = Regex::new(r"(?i)^#+\s*Month\s*(\d+):?\s*(.*)$").unwrap();
    static ref WEEK_HEADING: Regex = Regex::new(r"(?i)^#+\s*Week\s*(\d+):?\s*(.*)$").unwrap();
    static ref BULLET: Regex = Regex::new(r"(?i)^[-*]\s*(?:Day\s*(\d+):?)?\s*(.*)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    SeekMonth,
    InMonth,
    InWeek,
}

enum Line<'a> {
    Month { digits: &'a str, title: &'a str },
    Week { digits: &'a str, title: &'a str },
    Bullet { day: Option<&'a str>, text: &'a str },
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = MONTH_HEADING.captures(line) {
        return Line::Month {
            digits: caps.get(1).map_or("", |m| m.as_str()),
            title: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = WEEK_HEADING.captures(line) {
        return Line::Week {
            digits: caps.get(1).map_or("", |m| m.as_str()),
            title: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = BULLET.captures(line) {
        return Line::Bullet {
            day: caps.get(1).map(|m| m.as_str()),
            text: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    Line::Other
}

struct MarkdownParser {
    state: ParseState,
    months: Vec<Month>,
    day_counter: u32,
}

impl MarkdownParser {
    fn new() -> Self {
        Self {
            state: ParseState::SeekMonth,
            months: Vec::new(),
            day_counter: 0,
        }
    }

    fn feed(&mut self, line: &str) {
        match classify(line) {
            Line::Month { digits, title } => {
                let mut month = Month::new(heading_title(title, || {
                    format!("Month {} Milestone", digits)
                }));
                month.number = digits.parse().ok();
                self.months.push(month);
                self.state = ParseState::InMonth;
            }
            Line::Week { digits, title } => {
                let Some(month) = self.months.last_mut() else {
                    debug!("Dropping week heading outside of a month: {}", line);
                    return;
                };
                let mut week = Week::new(heading_title(title, || {
                    format!("Week {} Objective", digits)
                }));
                week.number = digits.parse().ok();
                month.weeks.push(week);
                self.day_counter = 0;
                self.state = ParseState::InWeek;
            }
            Line::Bullet { day, text } => {
                if self.state != ParseState::InWeek {
                    debug!("Dropping list item outside of a week: {}", line);
                    return;
                }
                let Some(week) = self.months.last_mut().and_then(|m| m.weeks.last_mut()) else {
                    return;
                };

                self.day_counter = self.day_counter.saturating_add(1);
                let day_number = day
                    .and_then(|d| d.parse::<u32>().ok())
                    .unwrap_or(self.day_counter);

                let index = match week.days.iter().position(|d| d.number == Some(day_number)) {
                    Some(index) => index,
                    None => {
                        let mut new_day = Day::new(format!("Day {}", day_number));
                        new_day.number = Some(day_number);
                        week.days.push(new_day);
                        week.days.len() - 1
                    }
                };
                week.days[index].tasks.push(Task::new(text.trim()));
            }
            Line::Other => {}
        }
    }

    fn finish(self, fallback_goal: &str) -> Option<Plan> {
        if self.months.is_empty() {
            warn!("Markdown parse could not find any monthly milestones");
            return None;
        }

        Some(normalize(Plan {
            goal: fallback_goal.to_string(),
            months: self.months,
        }))
    }
}

fn heading_title(captured: &str, default: impl FnOnce() -> String) -> String {
    let captured = captured.trim();
    if captured.is_empty() {
        default()
    } else {
        captured.to_string()
    }
}

/// Parses a Markdown plan, returning `None` when no month heading is found
///
/// The plan goal is always `fallback_goal`; the `# Goal:` line in the text is
/// not read.
pub fn parse(raw: &str, fallback_goal: &str) -> Option<Plan> {
    let mut parser = MarkdownParser::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        parser.feed(line);
    }
    parser.finish(fallback_goal)
}
