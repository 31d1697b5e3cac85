//! InsightEngine - Insight query execution core
//!
//! This crate provides the client-side execution core for named, parameterized
//! analytical queries ("insights") against a backend data engine. It handles
//! single and batched query execution, partial-failure aggregation for
//! batches, and synchronization of dependent data fetches (price history,
//! trade deals) with a shared symbol/timeframe selection.
//!
//! All backend access goes through the single [`CommandGateway`] boundary;
//! every other component is deterministic state management around it.

pub mod batch;
pub mod commands;
pub mod config;
pub mod deals;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod history;
pub mod selection;
pub mod types;

#[cfg(test)]
mod tests;

pub use batch::{BatchExecutionState, BatchInsightExecutor, InsightConfig};
pub use commands::{
    list_symbols, pull_assets, validate_and_store_deals, SymbolsFetcher, SymbolsState,
};
pub use config::EngineConfig;
pub use deals::DealsFetcher;
pub use error::{EngineError, Result};
pub use executor::{ExecutionState, InsightExecutor};
pub use gateway::{invoke_typed, CommandGateway, GatewayError};
pub use history::OhlcFetcher;
pub use selection::{SelectionState, SelectionStore};
pub use types::{
    AssetOperationResult, BatchInsightItem, BatchInsightRequest, BatchInsightResponse, Deal,
    DealFilePayload, DealImportResult, FetchState, FileImportResult, InsightRequest,
    InsightResponse, OhlcBar,
};

/// Default instrument symbol selected at startup
pub const DEFAULT_SYMBOL: &str = "USDJPY";

/// Default chart timeframe selected at startup
pub const DEFAULT_TIMEFRAME: &str = "1M";

/// Default account number for deal retrieval
pub const DEFAULT_ACCOUNT: &str = "5043757397";

/// File suffix expected by the deals storage backend
pub const DEALS_FILE_SUFFIX: &str = ".parquet";
