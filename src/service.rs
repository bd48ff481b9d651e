//! Plan service
//!
//! [`Core`] ties the generator, the parsing pipeline and the store together.
//! It is cheap to clone and shared by the HTTP server and the CLI.
//!
//! Each user has a [`Session`] holding per-user state: whether the generator
//! has been verified, whether a generation is in flight and how the last save
//! went. Only one generation per user may run at a time. Once
//! [`DEFAULT_SESSION_LIMIT`] users have sessions, idle ones are dropped
//! before a new one is created.
//!
//! Store access runs on the blocking pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::generator::{ChatMessage, CompletionRequest, GenerationError, PlanGenerator};
use crate::models::{Plan, PlanError, Progress, TaskCoord};
use crate::normalize::normalize;
use crate::parser::{
    self, extract_markdown_plan, markdown, parse_suggestions, PlanOutcome, RepairConfig,
    Suggestion,
};
use crate::prompts::{self, PlanFormat, FORMAT_REMINDER, PLANNER_SYSTEM_PROMPT};
use crate::store::{PlanKey, PlanStore, StoreError};

pub const MAX_GOAL_LENGTH: usize = 500;

pub const DEFAULT_SESSION_LIMIT: usize = 1024;

const KEY_CHECK_PROMPT: &str = "Hello";

/// Outcome of the most recent save for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saved,
    Failed,
}

/// Per-user state kept between requests
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub generator_verified: bool,
    pub generating: bool,
    pub save_status: SaveStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub goal: String,
    #[serde(default)]
    pub format: Option<PlanFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Goal of the plan the conversation is about, if any
    #[serde(default)]
    pub goal: Option<String>,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    /// The revised plan, when the reply contained one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

/// Checks a goal and returns it trimmed
pub fn validate_goal(goal: &str) -> Result<&str, PlanError> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(PlanError::MissingGoal);
    }
    if goal.chars().count() > MAX_GOAL_LENGTH {
        return Err(PlanError::GoalTooLong {
            max: MAX_GOAL_LENGTH,
        });
    }
    Ok(goal)
}

type Sessions = Arc<Mutex<HashMap<String, Session>>>;

fn with_sessions<F, R>(sessions: &Sessions, f: F) -> R
where
    F: FnOnce(&mut HashMap<String, Session>) -> R,
{
    let mut sessions = match sessions.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut sessions)
}

/// Clears the in-flight flag when a generation ends, however it ends
struct GenerationGuard {
    sessions: Sessions,
    user_id: String,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        with_sessions(&self.sessions, |sessions| {
            if let Some(session) = sessions.get_mut(&self.user_id) {
                session.generating = false;
            }
        });
    }
}

#[derive(Clone)]
pub struct Core {
    generator: Arc<dyn PlanGenerator>,
    store: Arc<dyn PlanStore>,
    sessions: Sessions,
    format: PlanFormat,
    repair: RepairConfig,
    session_limit: usize,
}

impl Core {
    pub fn new(generator: Arc<dyn PlanGenerator>, store: Arc<dyn PlanStore>) -> Self {
        Self {
            generator,
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            format: PlanFormat::default(),
            repair: RepairConfig::default(),
            session_limit: DEFAULT_SESSION_LIMIT,
        }
    }

    /// Sets the format requested when a generate call does not name one
    pub fn with_format(mut self, format: PlanFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_repair_config(mut self, repair: RepairConfig) -> Self {
        self.repair = repair;
        self
    }

    /// Sets how many sessions are kept before idle ones are dropped
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.session_limit = limit.max(1);
        self
    }

    fn with_session<F, R>(&self, user_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        with_sessions(&self.sessions, |sessions| {
            if !sessions.contains_key(user_id) && sessions.len() >= self.session_limit {
                let before = sessions.len();
                sessions.retain(|_, session| session.generating);
                debug!("Dropped {} idle sessions", before - sessions.len());
            }
            f(sessions.entry(user_id.to_string()).or_default())
        })
    }

    /// Snapshot of a user's session; unknown users get a fresh one that is
    /// not recorded
    pub fn session(&self, user_id: &str) -> Session {
        with_sessions(&self.sessions, |sessions| {
            sessions.get(user_id).cloned().unwrap_or_default()
        })
    }

    /// Runs a store operation on the blocking pool
    async fn with_store<F, R>(&self, f: F) -> Result<R, PlanError>
    where
        F: FnOnce(&dyn PlanStore) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(StoreError::from)?;
        Ok(result?)
    }

    fn begin_generation(&self, user_id: &str) -> Result<GenerationGuard, PlanError> {
        self.with_session(user_id, |session| {
            if session.generating {
                return Err(PlanError::Busy(user_id.to_string()));
            }
            session.generating = true;
            Ok(())
        })?;

        Ok(GenerationGuard {
            sessions: Arc::clone(&self.sessions),
            user_id: user_id.to_string(),
        })
    }

    /// Sends a short ping the first time a user generates a plan
    async fn verify_generator(&self, user_id: &str) -> Result<(), GenerationError> {
        if self.with_session(user_id, |session| session.generator_verified) {
            return Ok(());
        }

        debug!("Checking generator for user '{}'", user_id);
        let ping = CompletionRequest {
            messages: vec![ChatMessage::user(KEY_CHECK_PROMPT)],
        };
        self.generator.complete(&ping).await?;
        self.with_session(user_id, |session| session.generator_verified = true);
        Ok(())
    }

    async fn request_plan(
        &self,
        user_id: &str,
        goal: &str,
        format: PlanFormat,
    ) -> Result<String, GenerationError> {
        self.verify_generator(user_id).await?;
        let request =
            CompletionRequest::prompt(PLANNER_SYSTEM_PROMPT, prompts::plan_prompt(goal, format));
        self.generator.complete(&request).await
    }

    /// Generates, structures and stores a plan for a goal
    ///
    /// Generator failures and unusable output both produce the fallback plan
    /// with a notice; only validation and a concurrent generation are errors.
    pub async fn generate_plan(
        &self,
        user_id: &str,
        request: GenerateRequest,
    ) -> Result<PlanOutcome, PlanError> {
        let goal = validate_goal(&request.goal)?;
        let _guard = self.begin_generation(user_id)?;
        let format = request.format.unwrap_or(self.format);

        info!("Generating plan for user '{}'", user_id);
        let outcome = match self.request_plan(user_id, goal, format).await {
            Ok(raw) => parser::interpret_with(&raw, goal, &self.repair),
            Err(e) => {
                warn!("Plan generation failed for user '{}': {}", user_id, e);
                let notice = format!(
                    "{} I've created a basic plan template for you to get started.",
                    e.user_message()
                );
                PlanOutcome::fallback(goal, notice)
            }
        };

        self.persist(&PlanKey::for_goal(user_id, goal), &outcome.plan)
            .await;
        Ok(outcome)
    }

    /// Interprets raw text without calling the generator or storing anything
    pub fn parse(&self, raw: &str, goal: &str) -> Result<PlanOutcome, PlanError> {
        let goal = validate_goal(goal)?;
        Ok(parser::interpret_with(raw, goal, &self.repair))
    }

    /// Chats about a plan
    ///
    /// When the reply carries a complete revised plan, it replaces the stored
    /// plan and is returned alongside the reply.
    pub async fn chat(&self, user_id: &str, request: ChatRequest) -> Result<ChatReply, PlanError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(PlanError::MissingMessage);
        }

        let key = PlanKey::new(user_id, request.goal.clone());
        let plan = self.load(&key).await?;

        let mut messages = vec![ChatMessage::system(prompts::chat_system_prompt(
            plan.as_ref(),
        ))];
        messages.extend(request.history);
        let content = match plan {
            Some(_) => format!("{}{}", message, FORMAT_REMINDER),
            None => message.to_string(),
        };
        messages.push(ChatMessage::user(content));

        let reply = self.generator.complete(&CompletionRequest { messages }).await?;

        let Some(current) = plan else {
            return Ok(ChatReply {
                response: reply,
                plan: None,
            });
        };

        let revised = extract_markdown_plan(&reply)
            .and_then(|text| markdown::parse(text, &current.goal).map(|plan| (text, plan)));

        match revised {
            Some((text, revised)) => {
                info!("Chat reply revised the plan for {}", key);
                let revised = normalize(revised);
                self.persist(&key, &revised).await;
                Ok(ChatReply {
                    response: text.to_string(),
                    plan: Some(revised),
                })
            }
            None => Ok(ChatReply {
                response: reply,
                plan: None,
            }),
        }
    }

    async fn load(&self, key: &PlanKey) -> Result<Option<Plan>, PlanError> {
        let key = key.clone();
        self.with_store(move |store| store.load(&key)).await
    }

    pub async fn get_plan(&self, key: &PlanKey) -> Result<Plan, PlanError> {
        self.load(key)
            .await?
            .ok_or_else(|| PlanError::PlanNotFound(key.clone()))
    }

    pub async fn list_plans(&self, user_id: &str) -> Result<Vec<PlanKey>, PlanError> {
        let user_id = user_id.to_string();
        self.with_store(move |store| store.list(&user_id)).await
    }

    pub async fn delete_plan(&self, key: &PlanKey) -> Result<(), PlanError> {
        let owned = key.clone();
        if self.with_store(move |store| store.delete(&owned)).await? {
            Ok(())
        } else {
            Err(PlanError::PlanNotFound(key.clone()))
        }
    }

    /// Flips one task and stores the whole updated plan
    pub async fn toggle_task(&self, key: &PlanKey, coord: &TaskCoord) -> Result<Plan, PlanError> {
        let plan = self.get_plan(key).await?;
        let updated = plan.toggled(coord)?;
        self.persist(key, &updated).await;
        Ok(updated)
    }

    pub async fn progress(&self, key: &PlanKey) -> Result<Progress, PlanError> {
        Ok(self.get_plan(key).await?.progress())
    }

    /// Asks the generator for improvement suggestions on a stored plan
    pub async fn suggestions(&self, key: &PlanKey) -> Result<Vec<Suggestion>, PlanError> {
        let plan = self.get_plan(key).await?;
        let request =
            CompletionRequest::prompt(PLANNER_SYSTEM_PROMPT, prompts::suggestions_prompt(&plan));
        let reply = self.generator.complete(&request).await?;
        Ok(parse_suggestions(&reply))
    }

    /// Saves a plan; failures are logged and recorded on the session only
    async fn persist(&self, key: &PlanKey, plan: &Plan) {
        let (owned_key, owned_plan) = (key.clone(), plan.clone());
        let saved = self
            .with_store(move |store| store.save(&owned_key, &owned_plan))
            .await;
        let status = match saved {
            Ok(()) => SaveStatus::Saved,
            Err(e) => {
                warn!("Failed to save plan for {}: {}", key, e);
                SaveStatus::Failed
            }
        };
        self.with_session(&key.user_id, |session| session.save_status = status);
    }
}
