//! Milestone library crate
//!
//! Turns free-form generator output into validated 90-day plans
//! (months, weeks, days, tasks) and keeps track of task completion.

pub mod api;
pub mod cli;
pub mod generator;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod prompts;
pub mod service;
pub mod store;

pub use models::{Day, Month, NodeRef, Plan, PlanError, Progress, Task, TaskCoord, Week};
pub use normalize::normalize;
pub use parser::{interpret, PlanOutcome, PlanSource};
pub use service::Core;
