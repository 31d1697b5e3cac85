//! Trade-deals fetch synchronization
//!
//! [`DealsFetcher`] retrieves historical deal records for an account. The
//! account number doubles as the backend filename: it is trimmed, and the
//! deals file suffix is appended when missing. Rebinding the account in auto
//! mode re-fetches; completions follow the latest-wins policy.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::gateway::{invoke_typed, CommandGateway};
use crate::types::{Deal, FetchState};

/// Fetcher for historical deal records, bound to an account number
#[derive(Clone)]
pub struct DealsFetcher {
    gateway: Arc<dyn CommandGateway>,
    account: Arc<Mutex<String>>,
    file_suffix: String,
    state: Arc<Mutex<FetchState<Deal>>>,
    generation: Arc<AtomicU64>,
    auto_fetch: bool,
}

impl DealsFetcher {
    pub fn new(gateway: Arc<dyn CommandGateway>, account: impl Into<String>) -> Self {
        Self {
            gateway,
            account: Arc::new(Mutex::new(account.into())),
            file_suffix: crate::DEALS_FILE_SUFFIX.to_string(),
            state: Arc::new(Mutex::new(FetchState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            auto_fetch: false,
        }
    }

    /// Create a fetcher bound to the configured default account and suffix
    pub fn from_config(gateway: Arc<dyn CommandGateway>, config: &EngineConfig) -> Self {
        let mut fetcher = Self::new(gateway, config.default_account.clone());
        fetcher.file_suffix = config.deals_file_suffix.clone();
        fetcher
    }

    /// Enable or disable auto-fetch on account changes
    pub fn auto_fetch(mut self, enabled: bool) -> Self {
        self.auto_fetch = enabled;
        self
    }

    /// Snapshot of the current fetch state
    pub fn state(&self) -> FetchState<Deal> {
        self.state.lock().clone()
    }

    /// The account number deals are currently bound to
    pub fn account(&self) -> String {
        self.account.lock().clone()
    }

    /// Rebind the account number
    ///
    /// A no-op when unchanged. In auto mode a real change re-fetches in a
    /// spawned task.
    pub fn set_account(&self, account: impl Into<String>) {
        let account = account.into();
        let changed = {
            let mut current = self.account.lock();
            if *current == account {
                false
            } else {
                *current = account;
                true
            }
        };
        if changed && self.auto_fetch {
            let fetcher = self.clone();
            tokio::spawn(async move {
                fetcher.fetch().await;
            });
        }
    }

    /// Fetch deals for the bound account
    pub async fn fetch(&self) {
        let account = self.account.lock().clone();
        self.fetch_account(&account).await;
    }

    /// Fetch deals for an explicit account number
    ///
    /// On success the fetcher rebinds to this account. The account number is
    /// trimmed and must be non-empty, or the fetch fails locally without a
    /// gateway call.
    pub async fn fetch_account(&self, account: &str) {
        let account = account.trim();

        if account.is_empty() {
            tracing::warn!("deals fetch rejected: blank account number");
            let mut state = self.state.lock();
            state.error = Some("Account number is required".to_string());
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
            state.data.clear();
        }

        let filename = if account.ends_with(&self.file_suffix) {
            account.to_string()
        } else {
            format!("{account}{}", self.file_suffix)
        };
        tracing::debug!(%account, %filename, generation, "fetching deals");

        let result = invoke_typed::<Vec<Deal>>(
            self.gateway.as_ref(),
            "read_deals_from_file",
            json!({ "filename": filename }),
        )
        .await;

        // supersede check and apply share the state lock (see executor.rs)
        let mut state = self.state.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(%account, generation, "discarding superseded deals result");
            return;
        }
        state.is_loading = false;
        match result {
            Ok(deals) => {
                state.data = deals;
                state.error = None;
                drop(state);
                *self.account.lock() = account.to_string();
            }
            Err(err) => {
                tracing::warn!(%account, error = %err, "deals fetch failed");
                state.error = Some(err.to_string());
                state.data.clear();
            }
        }
    }
}
