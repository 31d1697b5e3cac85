//! Shared symbol/timeframe selection store
//!
//! The selection store is the one mutable resource shared across components:
//! any number of fetch synchronizers read and subscribe to it, while selection
//! UI writes it through the three mutators. It is backed by a `watch` channel,
//! so a combined symbol+timeframe change is one state transition and one
//! subscriber notification - never two sequential single-field updates that
//! could trigger duplicate downstream fetches.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

static GLOBAL_STORE: OnceCell<SelectionStore> = OnceCell::new();

/// The shared `(symbol, timeframe)` selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub symbol: String,
    pub timeframe: String,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            symbol: crate::DEFAULT_SYMBOL.to_string(),
            timeframe: crate::DEFAULT_TIMEFRAME.to_string(),
        }
    }
}

/// Observable store for the shared selection state
///
/// Cheap to clone; clones share the same underlying channel.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    tx: Arc<watch::Sender<SelectionState>>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    /// Create a store holding the default selection
    pub fn new() -> Self {
        Self::with_state(SelectionState::default())
    }

    /// Create a store initialized from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_state(SelectionState {
            symbol: config.default_symbol.clone(),
            timeframe: config.default_timeframe.clone(),
        })
    }

    /// Create a store holding the given initial selection
    pub fn with_state(initial: SelectionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Install `store` as the process-wide selection store
    ///
    /// Must be called exactly once, at process start, before any consumer
    /// calls [`SelectionStore::global`].
    pub fn install(store: SelectionStore) -> Result<()> {
        GLOBAL_STORE
            .set(store)
            .map_err(|_| EngineError::config("selection store is already installed"))
    }

    /// Get a handle to the process-wide selection store
    ///
    /// Fails fast with a configuration error when no store has been
    /// installed yet.
    pub fn global() -> Result<SelectionStore> {
        GLOBAL_STORE.get().cloned().ok_or_else(|| {
            EngineError::config(
                "selection store is not installed; call SelectionStore::install at startup",
            )
        })
    }

    /// Current selection snapshot
    pub fn get(&self) -> SelectionState {
        self.tx.borrow().clone()
    }

    /// Update the symbol, keeping the timeframe
    pub fn set_symbol(&self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        tracing::debug!(%symbol, "selection symbol changed");
        self.tx.send_modify(|state| state.symbol = symbol);
    }

    /// Update the timeframe, keeping the symbol
    pub fn set_timeframe(&self, timeframe: impl Into<String>) {
        let timeframe = timeframe.into();
        tracing::debug!(%timeframe, "selection timeframe changed");
        self.tx.send_modify(|state| state.timeframe = timeframe);
    }

    /// Update symbol and timeframe as a single state transition
    ///
    /// Subscribers observe exactly one notification carrying both new values;
    /// no intermediate mixed state is ever visible.
    pub fn set_symbol_and_timeframe(
        &self,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
    ) {
        let symbol = symbol.into();
        let timeframe = timeframe.into();
        tracing::debug!(%symbol, %timeframe, "selection changed");
        self.tx.send_modify(|state| {
            state.symbol = symbol;
            state.timeframe = timeframe;
        });
    }

    /// Subscribe to selection changes
    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection() {
        let store = SelectionStore::new();
        let state = store.get();
        assert_eq!(state.symbol, "USDJPY");
        assert_eq!(state.timeframe, "1M");
    }

    #[test]
    fn test_single_field_mutators() {
        let store = SelectionStore::new();
        store.set_symbol("EURUSD");
        assert_eq!(store.get().symbol, "EURUSD");
        assert_eq!(store.get().timeframe, "1M");

        store.set_timeframe("1H");
        assert_eq!(store.get().timeframe, "1H");
    }

    #[test]
    fn test_combined_update_is_one_notification() {
        let store = SelectionStore::new();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.set_symbol_and_timeframe("EURUSD", "1H");

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.symbol, "EURUSD");
        assert_eq!(seen.timeframe, "1H");
        // no second notification pending
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SelectionStore::new();
        let handle = store.clone();
        handle.set_symbol("GBPUSD");
        assert_eq!(store.get().symbol, "GBPUSD");
    }
}
