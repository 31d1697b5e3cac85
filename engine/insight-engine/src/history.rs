//! Price-history fetch synchronization
//!
//! [`OhlcFetcher`] binds OHLC retrieval to the shared selection store. Manual
//! fetches read the current selection (or an explicit override pair); the
//! auto-fetch task re-fetches on every store notification, so a combined
//! symbol+timeframe mutation produces exactly one fetch. Completions go
//! through the same latest-wins generation guard as the insight executors.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::gateway::{invoke_typed, CommandGateway};
use crate::selection::SelectionStore;
use crate::types::{FetchState, OhlcBar};

/// Fetcher for OHLC price history, bound to the selection store
#[derive(Clone)]
pub struct OhlcFetcher {
    gateway: Arc<dyn CommandGateway>,
    store: SelectionStore,
    state: Arc<Mutex<FetchState<OhlcBar>>>,
    generation: Arc<AtomicU64>,
}

impl OhlcFetcher {
    pub fn new(gateway: Arc<dyn CommandGateway>, store: SelectionStore) -> Self {
        Self {
            gateway,
            store,
            state: Arc::new(Mutex::new(FetchState::default())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the current fetch state
    pub fn state(&self) -> FetchState<OhlcBar> {
        self.state.lock().clone()
    }

    /// Fetch price history for the current selection
    pub async fn fetch(&self) {
        let selection = self.store.get();
        self.fetch_with(&selection.symbol, &selection.timeframe).await;
    }

    /// Fetch price history for an explicit symbol/timeframe pair
    ///
    /// Inputs are trimmed; both must be non-empty afterwards or the fetch
    /// fails locally without a gateway call.
    pub async fn fetch_with(&self, symbol: &str, timeframe: &str) {
        let symbol = symbol.trim();
        let timeframe = timeframe.trim();

        if symbol.is_empty() || timeframe.is_empty() {
            tracing::warn!("ohlc fetch rejected: blank symbol or timeframe");
            let mut state = self.state.lock();
            state.error = Some("Symbol and timeframe are required".to_string());
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
            state.data.clear();
        }
        tracing::debug!(%symbol, %timeframe, generation, "fetching price history");

        let result = invoke_typed::<Vec<OhlcBar>>(
            self.gateway.as_ref(),
            "retrieve_asset_ochl",
            json!({ "symbol": symbol, "timeframe": timeframe }),
        )
        .await;

        // supersede check and apply share the state lock (see executor.rs)
        let mut state = self.state.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(%symbol, %timeframe, generation, "discarding superseded price history");
            return;
        }
        state.is_loading = false;
        match result {
            Ok(bars) => {
                state.data = bars;
                state.error = None;
            }
            Err(err) => {
                tracing::warn!(%symbol, %timeframe, error = %err, "price history fetch failed");
                state.error = Some(err.to_string());
                state.data.clear();
            }
        }
    }

    /// Spawn the auto-fetch task
    ///
    /// Fetches once for the current selection, then re-fetches on every store
    /// notification until the store is dropped. Fetches are serialized within
    /// the task; changes arriving mid-fetch coalesce to the latest selection.
    pub fn spawn_auto_fetch(&self) -> JoinHandle<()> {
        let fetcher = self.clone();
        let mut rx = self.store.subscribe();
        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            fetcher.fetch_with(&initial.symbol, &initial.timeframe).await;
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let selection = rx.borrow_and_update().clone();
                fetcher.fetch_with(&selection.symbol, &selection.timeframe).await;
            }
        })
    }
}
