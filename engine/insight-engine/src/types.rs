//! Wire types for the command gateway boundary
//!
//! Everything crossing the gateway is plain serde data. Insight rows carry a
//! dynamic, data-driven shape (`serde_json::Value` maps) because each insight
//! defines its own result schema; `columns` names the fields present in every
//! row so consumers never have to assume a fixed schema per insight.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to execute a single insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    /// The unique identifier of the insight to execute (dotted namespace)
    pub insight_id: String,
    /// The parameters for the insight (dynamic shape based on insight)
    pub parameters: Value,
}

/// Response from executing a single insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    /// Whether the execution was successful
    pub success: bool,
    /// The result data (one map per row)
    pub data: Option<Vec<Value>>,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Column names for table rendering (extracted from result data)
    #[serde(default)]
    pub columns: Vec<String>,
}

impl InsightResponse {
    /// Create a successful response
    pub fn success(data: Vec<Value>, columns: Vec<String>) -> Self {
        Self { success: true, data: Some(data), error: None, columns }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()), columns: Vec::new() }
    }
}

/// Batch request to execute multiple insights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInsightRequest {
    /// Insight requests to execute; response order matches this order
    pub requests: Vec<InsightRequest>,
}

/// Individual result item in a batch response
///
/// A batch item never raises; failure is represented in-band through
/// `success`/`error` so one failing insight cannot abort its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInsightItem {
    /// The insight identifier echoed from the originating request
    pub insight_id: String,
    pub success: bool,
    pub data: Option<Vec<Value>>,
    pub error: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl BatchInsightItem {
    /// Create a successful batch item
    pub fn success(insight_id: impl Into<String>, data: Vec<Value>, columns: Vec<String>) -> Self {
        Self {
            insight_id: insight_id.into(),
            success: true,
            data: Some(data),
            error: None,
            columns,
        }
    }

    /// Create a failed batch item
    pub fn error(insight_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            insight_id: insight_id.into(),
            success: false,
            data: None,
            error: Some(message.into()),
            columns: Vec::new(),
        }
    }
}

/// Batch response containing one result per request, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInsightResponse {
    pub results: Vec<BatchInsightItem>,
}

/// One OHLC bar of price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    /// Unix timestamp in seconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One deal (trade/ledger entry) from historical account data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub ticket: i64,
    pub order: i64,
    pub time: i64,
    pub time_msc: i64,
    #[serde(rename = "type")]
    pub deal_type: i64,
    pub entry: i64,
    pub magic: i64,
    pub position_id: i64,
    pub reason: i64,
    pub volume: f64,
    pub price: f64,
    pub commission: f64,
    pub swap: f64,
    pub profit: f64,
    pub fee: f64,
    pub symbol: String,
    pub comment: String,
    pub external_id: String,
}

/// One file handed to `validate_and_store_deals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealFilePayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of a deal import operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealImportResult {
    pub success: bool,
    pub message: String,
    pub file_results: Vec<FileImportResult>,
}

/// Result for a single file import operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileImportResult {
    pub filename: String,
    pub success: bool,
    pub message: String,
}

/// Result of an asset maintenance operation (`pull_assets`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetOperationResult {
    pub success: bool,
    pub message: String,
}

/// In-memory lifecycle state for a fetch synchronizer
///
/// Created empty, `is_loading` set while a fetch is in flight, then exactly
/// one of `data` or `error` populated on completion.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self { data: Vec::new(), is_loading: false, error: None }
    }
}

/// Extract column names from the first row of a result set
///
/// Keys keep the order the backend serialized them in. An empty result set
/// has no derivable columns.
pub fn columns_of(rows: &[Value]) -> Vec<String> {
    rows.first()
        .and_then(Value::as_object)
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}
