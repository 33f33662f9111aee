//! Action handler registry.
//!
//! Maps action names to handlers, tracks per-action invocation statistics,
//! and executes actions with wall-clock accounting on both success and
//! failure paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::types::{ActionMetadata, ActionParams, ActionSummary, RegistryStats};

/// A named, invokable unit of server-side logic.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError>;
}

#[derive(Default)]
struct ActionStats {
    invocations: u64,
    total: Duration,
    last_invoked: Option<Timestamp>,
}

struct ActionEntry {
    handler: Arc<dyn ActionHandler>,
    metadata: ActionMetadata,
    stats: ActionStats,
}

/// Registry mapping action names to handlers and their statistics.
///
/// All mutation goes through this API; the map sits behind a single mutex
/// that is never held across an await, so stats updates for concurrent
/// executions serialize without lost increments.
pub struct ActionRegistry {
    actions: Mutex<HashMap<String, ActionEntry>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(HashMap::new()),
        }
    }

    /// Store or overwrite a handler under `name`. Overwriting is not an
    /// error, but it is worth a warning in the log.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
        metadata: ActionMetadata,
    ) {
        let name = name.into();
        let mut actions = self.actions.lock().unwrap();
        if actions.contains_key(&name) {
            warn!(action = %name, "Overwriting existing action");
        }
        info!(action = %name, description = %metadata.description, "Registered action");
        actions.insert(
            name,
            ActionEntry {
                handler,
                metadata,
                stats: ActionStats::default(),
            },
        );
    }

    /// Execute a named action.
    ///
    /// The handler `Arc` is captured under the lock and awaited without it,
    /// so a slow handler cannot stall unrelated executions, and an in-flight
    /// execution is unaffected by concurrent re-registration. Duration is
    /// accounted whether the handler succeeds or fails; failures come back
    /// wrapped with the action name and elapsed time.
    pub async fn execute(
        &self,
        name: &str,
        params: &ActionParams,
    ) -> Result<Value, ActionError> {
        let handler = {
            let actions = self.actions.lock().unwrap();
            let entry = actions
                .get(name)
                .ok_or_else(|| ActionError::NotFound(name.to_string()))?;
            Arc::clone(&entry.handler)
        };

        let started = Instant::now();
        let result = handler.execute(params).await;
        let elapsed = started.elapsed();

        {
            let mut actions = self.actions.lock().unwrap();
            // The entry may have been unregistered mid-flight; stats for a
            // removed action are simply dropped.
            if let Some(entry) = actions.get_mut(name) {
                entry.stats.invocations += 1;
                entry.stats.total += elapsed;
                entry.stats.last_invoked = Some(Timestamp::now());
            }
        }

        match result {
            Ok(value) => {
                info!(action = %name, elapsed_ms = elapsed.as_millis() as u64, "Action completed");
                Ok(value)
            }
            Err(e) => {
                error!(action = %name, elapsed_ms = elapsed.as_millis() as u64, error = %e, "Action failed");
                Err(ActionError::Handler {
                    action: name.to_string(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Snapshot of every registered action, sorted by name.
    pub fn list(&self) -> Vec<ActionSummary> {
        let actions = self.actions.lock().unwrap();
        let mut summaries: Vec<ActionSummary> = actions
            .iter()
            .map(|(name, entry)| {
                let total_secs = entry.stats.total.as_secs_f64();
                ActionSummary {
                    name: name.clone(),
                    description: entry.metadata.description.clone(),
                    requires_approval: entry.metadata.requires_approval,
                    invocation_count: entry.stats.invocations,
                    total_secs,
                    average_secs: if entry.stats.invocations > 0 {
                        total_secs / entry.stats.invocations as f64
                    } else {
                        0.0
                    },
                    last_invoked: entry.stats.last_invoked,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Metadata for one action, if registered.
    pub fn metadata(&self, name: &str) -> Option<ActionMetadata> {
        let actions = self.actions.lock().unwrap();
        actions.get(name).map(|entry| entry.metadata.clone())
    }

    /// Remove an action and its metadata and statistics in one step.
    ///
    /// Returns `true` if the action existed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut actions = self.actions.lock().unwrap();
        let removed = actions.remove(name).is_some();
        if removed {
            info!(action = %name, "Unregistered action");
        }
        removed
    }

    /// Aggregate statistics across all registered actions.
    pub fn stats(&self) -> RegistryStats {
        let actions = self.actions.lock().unwrap();
        let total_invocations: u64 = actions.values().map(|e| e.stats.invocations).sum();
        let total_secs: f64 = actions.values().map(|e| e.stats.total.as_secs_f64()).sum();
        RegistryStats {
            total_actions: actions.len(),
            total_invocations,
            total_secs,
            average_secs: if total_invocations > 0 {
                total_secs / total_invocations as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
