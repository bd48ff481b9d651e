//! Plan persistence
//!
//! Plans are stored whole, keyed by user and optionally by goal. Saving a plan
//! replaces whatever was stored under the same key.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::Plan;
use crate::normalize::plan_from_value;

/// Identifies a stored plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanKey {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl PlanKey {
    /// The user's plan for one goal
    pub fn for_goal(user_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            goal: Some(goal.into()),
        }
    }

    /// The user's single current plan
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            goal: None,
        }
    }

    pub fn new(user_id: impl Into<String>, goal: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            goal: goal.filter(|g| !g.trim().is_empty()),
        }
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.goal {
            Some(goal) => write!(f, "user '{}', goal '{}'", self.user_id, goal),
            None => write!(f, "user '{}'", self.user_id),
        }
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored plan is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Whole-plan storage
pub trait PlanStore: Send + Sync {
    fn load(&self, key: &PlanKey) -> Result<Option<Plan>, StoreError>;

    fn save(&self, key: &PlanKey, plan: &Plan) -> Result<(), StoreError>;

    /// Keys of every plan stored for a user, sorted
    fn list(&self, user_id: &str) -> Result<Vec<PlanKey>, StoreError>;

    /// Returns whether anything was deleted
    fn delete(&self, key: &PlanKey) -> Result<bool, StoreError>;
}

/// In-process store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    plans: Mutex<HashMap<PlanKey, Plan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_plans<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<PlanKey, Plan>) -> R,
    {
        let mut plans = match self.plans.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut plans)
    }
}

impl PlanStore for MemoryStore {
    fn load(&self, key: &PlanKey) -> Result<Option<Plan>, StoreError> {
        Ok(self.with_plans(|plans| plans.get(key).cloned()))
    }

    fn save(&self, key: &PlanKey, plan: &Plan) -> Result<(), StoreError> {
        self.with_plans(|plans| plans.insert(key.clone(), plan.clone()));
        Ok(())
    }

    fn list(&self, user_id: &str) -> Result<Vec<PlanKey>, StoreError> {
        let mut keys: Vec<PlanKey> = self.with_plans(|plans| {
            plans
                .keys()
                .filter(|k| k.user_id == user_id)
                .cloned()
                .collect()
        });
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &PlanKey) -> Result<bool, StoreError> {
        Ok(self.with_plans(|plans| plans.remove(key).is_some()))
    }
}

/// Document written for each plan
#[derive(Debug, Serialize, Deserialize)]
struct StoredPlan {
    key: PlanKey,
    saved_at: DateTime<Utc>,
    plan: Value,
}

const CURRENT_PLAN_FILE: &str = "_current";

/// Longest encoded component used as-is, leaving room for `.json.tmp`
/// under the usual 255-byte file name limit
const MAX_COMPONENT_LEN: usize = 200;

/// Encoded characters kept in front of the hash of an oversized component
const HASHED_PREFIX_LEN: usize = 48;

/// Stores each plan as a JSON file under `<root>/<user>/<goal>.json`
///
/// Plans are loaded leniently and normalized, so files edited by hand or
/// written by older versions still load.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(file_component(user_id))
    }

    fn path_for(&self, key: &PlanKey) -> PathBuf {
        let file = match &key.goal {
            Some(goal) => file_component(goal),
            None => CURRENT_PLAN_FILE.to_string(),
        };
        self.user_dir(&key.user_id).join(format!("{}.json", file))
    }

    fn read_document(path: &Path) -> Result<Option<StoredPlan>, StoreError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Makes a string safe to use as a single path component
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_xx`.
/// The mapping is one-to-one, so distinct goals never share a file.
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02x}", byte));
        }
    }
    if encoded.is_empty() {
        encoded.push('_');
    }
    encoded
}

/// Encodes a component, replacing oversized names with a readable prefix
/// followed by `~` and the SHA-256 of the raw text
///
/// `~` never appears in [`encode_component`] output, so hashed names cannot
/// collide with plain ones. The full key is kept inside the stored document.
fn file_component(raw: &str) -> String {
    let encoded = encode_component(raw);
    if encoded.len() <= MAX_COMPONENT_LEN {
        return encoded;
    }
    let hash = format!("{:x}", Sha256::digest(raw.as_bytes()));
    format!("{}~{}", &encoded[..HASHED_PREFIX_LEN], hash)
}

impl PlanStore for JsonFileStore {
    fn load(&self, key: &PlanKey) -> Result<Option<Plan>, StoreError> {
        let path = self.path_for(key);
        let Some(stored) = Self::read_document(&path)? else {
            return Ok(None);
        };
        let goal = key.goal.as_deref().unwrap_or_default();
        Ok(Some(plan_from_value(&stored.plan, goal)))
    }

    fn save(&self, key: &PlanKey, plan: &Plan) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let document = StoredPlan {
            key: key.clone(),
            saved_at: Utc::now(),
            plan: serde_json::to_value(plan)?,
        };

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&document)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved plan for {} to {}", key, path.display());
        Ok(())
    }

    fn list(&self, user_id: &str) -> Result<Vec<PlanKey>, StoreError> {
        let dir = self.user_dir(user_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stored) = Self::read_document(&path)? {
                keys.push(stored.key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &PlanKey) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
