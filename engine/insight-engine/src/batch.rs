//! Batched insight execution
//!
//! [`BatchInsightExecutor`] bundles N independent insight executions into one
//! `execute_batch_insights` call. The backend owns the fan-out/fan-in; this
//! side enforces the contract around it: results come back in request order,
//! one failing item never suppresses its siblings, and failures are folded
//! into a single advisory error message while successful items stay usable.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::gateway::CommandGateway;
use crate::types::{BatchInsightItem, BatchInsightResponse, InsightRequest};

/// One insight configuration within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub insight_id: String,
    pub parameters: Value,
}

impl InsightConfig {
    pub fn new(insight_id: impl Into<String>, parameters: Value) -> Self {
        Self { insight_id: insight_id.into(), parameters }
    }
}

/// Lifecycle state of a batch execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchExecutionState {
    /// Per-request results, in request order
    pub data: Option<Vec<BatchInsightItem>>,
    pub is_loading: bool,
    /// Advisory when set alongside `data`: lists the failed insight ids, but
    /// the successful items in `data` remain valid and should still be used
    pub error: Option<String>,
}

/// Executor for an ordered list of insight configurations
#[derive(Clone)]
pub struct BatchInsightExecutor {
    gateway: Arc<dyn CommandGateway>,
    configs: Arc<Mutex<Vec<InsightConfig>>>,
    state: Arc<Mutex<BatchExecutionState>>,
    generation: Arc<AtomicU64>,
    auto_execute: bool,
}

impl BatchInsightExecutor {
    pub fn new(gateway: Arc<dyn CommandGateway>, configs: Vec<InsightConfig>) -> Self {
        Self {
            gateway,
            configs: Arc::new(Mutex::new(configs)),
            state: Arc::new(Mutex::new(BatchExecutionState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            auto_execute: false,
        }
    }

    /// Enable or disable auto-execution on configuration changes
    pub fn auto_execute(mut self, enabled: bool) -> Self {
        self.auto_execute = enabled;
        self
    }

    /// Snapshot of the current batch state
    pub fn state(&self) -> BatchExecutionState {
        self.state.lock().clone()
    }

    /// Replace the configuration list
    ///
    /// Structural change detection; an equal list is a no-op. In auto mode a
    /// real change re-executes in a spawned task.
    pub fn set_configs(&self, configs: Vec<InsightConfig>) {
        let changed = {
            let mut current = self.configs.lock();
            if *current == configs {
                false
            } else {
                *current = configs;
                true
            }
        };
        if changed && self.auto_execute {
            let executor = self.clone();
            tokio::spawn(async move {
                executor.execute().await;
            });
        }
    }

    /// Execute the batch, updating state on completion
    ///
    /// Never returns an error; all failure modes end up in the batch state.
    /// Stale completions are discarded per the latest-wins policy.
    pub async fn execute(&self) {
        let configs = self.configs.lock().clone();

        if configs.is_empty() {
            tracing::warn!("batch execution rejected: no configurations");
            let mut state = self.state.lock();
            state.error = Some("At least one insight configuration is required".to_string());
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
            state.data = None;
        }
        tracing::debug!(count = configs.len(), generation, "executing insight batch");

        let requests: Vec<InsightRequest> = configs
            .into_iter()
            .map(|config| InsightRequest {
                insight_id: config.insight_id,
                parameters: config.parameters,
            })
            .collect();

        let result = self
            .gateway
            .invoke("execute_batch_insights", json!({ "request": { "requests": requests } }))
            .await;

        // supersede check and apply share the state lock (see executor.rs)
        let mut state = self.state.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(generation, "discarding superseded batch result");
            return;
        }
        state.is_loading = false;
        match result {
            Ok(value) => match serde_json::from_value::<BatchInsightResponse>(value) {
                Ok(response) => {
                    state.error = aggregate_failures(&response.results);
                    state.data = Some(response.results);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "malformed batch response");
                    state.error = Some("Invalid response format".to_string());
                    state.data = None;
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "batch execution failed");
                state.error = Some(err.to_string());
                state.data = None;
            }
        }
    }
}

/// Fold failing items into one advisory message, `None` when all succeeded
fn aggregate_failures(results: &[BatchInsightItem]) -> Option<String> {
    let failures: Vec<String> = results
        .iter()
        .filter(|item| !item.success)
        .map(|item| {
            format!("{}: {}", item.insight_id, item.error.as_deref().unwrap_or("Unknown error"))
        })
        .collect();

    if failures.is_empty() {
        None
    } else {
        Some(format!("Some insights failed: {}", failures.join("; ")))
    }
}
