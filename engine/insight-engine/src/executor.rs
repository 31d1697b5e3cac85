//! Single-insight execution
//!
//! [`InsightExecutor`] runs one named insight with parameters through the
//! command gateway and tracks the loading/data/error/columns lifecycle.
//! Overlapping invocations are resolved with a latest-wins policy: each
//! dispatch takes a generation number, and a completion only writes state if
//! it is still the most recently dispatched generation. A slow, stale
//! response can therefore never overwrite state written by a newer request.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::gateway::{invoke_typed, CommandGateway};
use crate::types::{InsightRequest, InsightResponse};

/// Per-executor lifecycle state
///
/// Created empty; `is_loading` set while an invocation is in flight; then
/// exactly one of `data`+`columns` or `error` populated on completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    pub data: Option<Vec<Value>>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub columns: Vec<String>,
}

/// Executor for a single named insight
///
/// Cheap to clone; clones share state, inputs, and the generation counter,
/// so a clone handed to a spawned task participates in the same latest-wins
/// ordering.
#[derive(Clone)]
pub struct InsightExecutor {
    gateway: Arc<dyn CommandGateway>,
    insight_id: Arc<Mutex<String>>,
    parameters: Arc<Mutex<Value>>,
    state: Arc<Mutex<ExecutionState>>,
    generation: Arc<AtomicU64>,
    auto_execute: bool,
}

impl InsightExecutor {
    /// Create an executor for `insight_id` with the given parameters
    pub fn new(
        gateway: Arc<dyn CommandGateway>,
        insight_id: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            gateway,
            insight_id: Arc::new(Mutex::new(insight_id.into())),
            parameters: Arc::new(Mutex::new(parameters)),
            state: Arc::new(Mutex::new(ExecutionState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            auto_execute: false,
        }
    }

    /// Enable or disable auto-execution on input changes
    ///
    /// In auto mode, [`set_insight_id`](Self::set_insight_id) and
    /// [`set_parameters`](Self::set_parameters) re-execute in a spawned task
    /// whenever the value actually changes. Requires a tokio runtime.
    pub fn auto_execute(mut self, enabled: bool) -> Self {
        self.auto_execute = enabled;
        self
    }

    /// Snapshot of the current execution state
    pub fn state(&self) -> ExecutionState {
        self.state.lock().clone()
    }

    /// The insight identifier this executor is bound to
    pub fn insight_id(&self) -> String {
        self.insight_id.lock().clone()
    }

    /// Replace the insight identifier
    ///
    /// A no-op when the identifier is unchanged.
    pub fn set_insight_id(&self, insight_id: impl Into<String>) {
        let insight_id = insight_id.into();
        let changed = {
            let mut current = self.insight_id.lock();
            if *current == insight_id {
                false
            } else {
                *current = insight_id;
                true
            }
        };
        if changed {
            self.trigger_auto_execute();
        }
    }

    /// Replace the parameters
    ///
    /// Change detection is structural: passing a value equal to the current
    /// one is a no-op and never causes a spurious re-execution.
    pub fn set_parameters(&self, parameters: Value) {
        let changed = {
            let mut current = self.parameters.lock();
            if *current == parameters {
                false
            } else {
                *current = parameters;
                true
            }
        };
        if changed {
            self.trigger_auto_execute();
        }
    }

    fn trigger_auto_execute(&self) {
        if !self.auto_execute {
            return;
        }
        let executor = self.clone();
        tokio::spawn(async move {
            executor.execute().await;
        });
    }

    /// Execute the insight, updating state on completion
    ///
    /// Never returns an error; all failure modes end up in the execution
    /// state. Safe to call concurrently - stale completions are discarded.
    pub async fn execute(&self) {
        let (insight_id, parameters) =
            { (self.insight_id.lock().clone(), self.parameters.lock().clone()) };

        if insight_id.trim().is_empty() {
            tracing::warn!("insight execution rejected: empty insight id");
            let mut state = self.state.lock();
            state.error = Some("Insight ID is required".to_string());
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
            state.data = None;
            state.columns.clear();
        }
        tracing::debug!(insight_id = %insight_id, generation, "executing insight");

        let request = InsightRequest { insight_id: insight_id.clone(), parameters };
        let result = invoke_typed::<InsightResponse>(
            self.gateway.as_ref(),
            "execute_insight",
            json!({ "request": request }),
        )
        .await;

        // supersede check and apply share the state lock; a newer dispatch
        // clears state under the same lock after bumping the counter
        let mut state = self.state.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(insight_id = %insight_id, generation, "discarding superseded insight result");
            return;
        }
        state.is_loading = false;
        match result {
            Ok(response) if response.success && response.data.is_some() => {
                state.data = response.data;
                state.columns = response.columns;
                state.error = None;
            }
            Ok(response) => {
                state.error =
                    Some(response.error.unwrap_or_else(|| "Unknown error occurred".to_string()));
                state.data = None;
                state.columns.clear();
            }
            Err(err) => {
                tracing::warn!(insight_id = %insight_id, error = %err, "insight execution failed");
                state.error = Some(err.to_string());
                state.data = None;
            }
        }
    }
}
