//! Typed wrappers for the remaining backend commands
//!
//! These commands have fixed request/response shapes and no re-fetch
//! binding, so a thin typed call is enough.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use crate::gateway::{invoke_typed, CommandGateway, GatewayError};
use crate::types::{AssetOperationResult, DealFilePayload, DealImportResult};

/// List the symbols the backend has price data for
pub async fn list_symbols(gateway: &dyn CommandGateway) -> Result<Vec<String>, GatewayError> {
    invoke_typed(gateway, "list_symbols", json!({})).await
}

/// Refresh the backend's asset data from its upstream source
pub async fn pull_assets(
    gateway: &dyn CommandGateway,
) -> Result<AssetOperationResult, GatewayError> {
    invoke_typed(gateway, "pull_assets", json!({})).await
}

/// Validate uploaded deal files and store the ones that pass
///
/// The result carries a per-file breakdown; a rejected file does not prevent
/// the others from being stored.
pub async fn validate_and_store_deals(
    gateway: &dyn CommandGateway,
    files: Vec<DealFilePayload>,
) -> Result<DealImportResult, GatewayError> {
    tracing::debug!(count = files.len(), "importing deal files");
    invoke_typed(gateway, "validate_and_store_deals", json!({ "files": files })).await
}

/// Lifecycle state of the symbols list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolsState {
    pub symbols: Vec<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// True once a fetch has completed, successfully or not
    pub has_fetched: bool,
}

/// Fetcher for the available-symbols list
///
/// Fetched on demand (typically when the symbol picker opens); `has_fetched`
/// lets callers distinguish "not loaded yet" from "loaded and empty".
#[derive(Clone)]
pub struct SymbolsFetcher {
    gateway: Arc<dyn CommandGateway>,
    state: Arc<Mutex<SymbolsState>>,
}

impl SymbolsFetcher {
    pub fn new(gateway: Arc<dyn CommandGateway>) -> Self {
        Self { gateway, state: Arc::new(Mutex::new(SymbolsState::default())) }
    }

    /// Snapshot of the current symbols state
    pub fn state(&self) -> SymbolsState {
        self.state.lock().clone()
    }

    /// Fetch the symbols list, updating state on completion
    pub async fn fetch_symbols(&self) {
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
        }

        let result = list_symbols(self.gateway.as_ref()).await;

        let mut state = self.state.lock();
        state.is_loading = false;
        state.has_fetched = true;
        match result {
            Ok(symbols) => {
                tracing::debug!(count = symbols.len(), "fetched symbols");
                state.symbols = symbols;
                state.error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "symbols fetch failed");
                state.error = Some(err.to_string());
                state.symbols.clear();
            }
        }
    }
}
