//! End-to-end exercise of the insight execution core against an in-memory
//! backend. Covers single and batched execution, partial failure, selection
//! driven auto-fetching, and the remaining gateway commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use insight_engine::types::columns_of;
use insight_engine::{
    list_symbols, pull_assets, validate_and_store_deals, BatchInsightExecutor, CommandGateway,
    DealFilePayload, DealsFetcher, EngineConfig, GatewayError, InsightConfig, InsightExecutor,
    InsightResponse, OhlcFetcher, SelectionStore, SymbolsFetcher,
};

type InsightHandler = fn(&InMemoryBackend, &Value) -> Result<Vec<Value>, String>;

/// In-memory stand-in for the backend data engine
struct InMemoryBackend {
    symbols: Vec<String>,
    deal_files: HashMap<String, Vec<Value>>,
    insights: HashMap<&'static str, InsightHandler>,
}

impl InMemoryBackend {
    fn arc() -> Arc<Self> {
        let deals = vec![
            json!({"ticket": 1, "order": 1, "time": 1_700_000_000, "time_msc": 1_700_000_000_000i64,
                   "type": 0, "entry": 1, "magic": 0, "position_id": 1, "reason": 0,
                   "volume": 0.10, "price": 151.20, "commission": -0.70, "swap": 0.0,
                   "profit": 42.50, "fee": 0.0, "symbol": "USDJPY", "comment": "", "external_id": ""}),
            json!({"ticket": 2, "order": 2, "time": 1_700_003_600, "time_msc": 1_700_003_600_000i64,
                   "type": 1, "entry": 1, "magic": 0, "position_id": 2, "reason": 0,
                   "volume": 0.20, "price": 1.0850, "commission": -1.40, "swap": -0.3,
                   "profit": -17.25, "fee": 0.0, "symbol": "EURUSD", "comment": "", "external_id": ""}),
            json!({"ticket": 3, "order": 3, "time": 1_700_007_200, "time_msc": 1_700_007_200_000i64,
                   "type": 0, "entry": 1, "magic": 0, "position_id": 3, "reason": 0,
                   "volume": 0.10, "price": 151.95, "commission": -0.70, "swap": 0.0,
                   "profit": 12.80, "fee": 0.0, "symbol": "USDJPY", "comment": "", "external_id": ""}),
        ];

        // insight dispatch is a lookup table, one handler per insight id
        let mut insights: HashMap<&'static str, InsightHandler> = HashMap::new();
        insights.insert("deals.total_balance", Self::insight_total_balance);
        insights.insert("deals.trade_entries", Self::insight_trade_entries);
        insights.insert("deals.profit_by_symbol", Self::insight_profit_by_symbol);

        Arc::new(Self {
            symbols: vec!["USDJPY".into(), "EURUSD".into(), "GBPUSD".into()],
            deal_files: HashMap::from([("5043757397.parquet".to_string(), deals)]),
            insights,
        })
    }

    fn default_deals(&self) -> &[Value] {
        self.deal_files["5043757397.parquet"].as_slice()
    }

    fn insight_total_balance(&self, _params: &Value) -> Result<Vec<Value>, String> {
        let balance: f64 = self
            .default_deals()
            .iter()
            .map(|d| d["profit"].as_f64().unwrap_or(0.0) + d["commission"].as_f64().unwrap_or(0.0))
            .sum();
        Ok(vec![json!({"balance": (balance * 100.0).round() / 100.0})])
    }

    fn insight_trade_entries(&self, _params: &Value) -> Result<Vec<Value>, String> {
        Ok(self
            .default_deals()
            .iter()
            .map(|d| json!({"time": d["time"], "symbol": d["symbol"], "profit": d["profit"]}))
            .collect())
    }

    fn insight_profit_by_symbol(&self, _params: &Value) -> Result<Vec<Value>, String> {
        let mut by_symbol: Vec<(String, f64)> = Vec::new();
        for deal in self.default_deals() {
            let symbol = deal["symbol"].as_str().unwrap_or("").to_string();
            let profit = deal["profit"].as_f64().unwrap_or(0.0);
            match by_symbol.iter_mut().find(|(s, _)| *s == symbol) {
                Some((_, total)) => *total += profit,
                None => by_symbol.push((symbol, profit)),
            }
        }
        Ok(by_symbol
            .into_iter()
            .map(|(symbol, profit)| json!({"symbol": symbol, "profit": profit}))
            .collect())
    }

    fn run_insight(&self, request: &Value) -> InsightResponse {
        let insight_id = request["insight_id"].as_str().unwrap_or("");
        let parameters = &request["parameters"];
        match self.insights.get(insight_id) {
            Some(handler) => match handler(self, parameters) {
                Ok(rows) => {
                    let columns = columns_of(&rows);
                    InsightResponse::success(rows, columns)
                }
                Err(message) => InsightResponse::error(message),
            },
            None => InsightResponse::error(format!("Unknown insight: {insight_id}")),
        }
    }

    fn ohlc_bars(symbol: &str, count: usize) -> Vec<Value> {
        let seed = symbol.bytes().map(u64::from).sum::<u64>() as f64;
        (0..count)
            .map(|i| {
                let open = 100.0 + seed % 50.0 + i as f64 * 0.25;
                json!({
                    "time": 1_700_000_000i64 + i as i64 * 3600,
                    "open": open,
                    "high": open + 0.8,
                    "low": open - 0.6,
                    "close": open + 0.2,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CommandGateway for InMemoryBackend {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, GatewayError> {
        let wrap = |err: String| GatewayError::invoke(command, err);
        match command {
            "execute_insight" => {
                let response = self.run_insight(&args["request"]);
                serde_json::to_value(response).map_err(|e| wrap(e.to_string()))
            }
            "execute_batch_insights" => {
                let requests = args["request"]["requests"]
                    .as_array()
                    .cloned()
                    .ok_or_else(|| wrap("missing requests".to_string()))?;
                let results: Vec<Value> = requests
                    .iter()
                    .map(|request| {
                        let response = self.run_insight(request);
                        json!({
                            "insight_id": request["insight_id"],
                            "success": response.success,
                            "data": response.data,
                            "error": response.error,
                            "columns": response.columns,
                        })
                    })
                    .collect();
                Ok(json!({ "results": results }))
            }
            "retrieve_asset_ochl" => {
                let symbol = args["symbol"].as_str().unwrap_or("");
                if !self.symbols.iter().any(|s| s == symbol) {
                    return Err(wrap(format!("no price data for symbol '{symbol}'")));
                }
                Ok(Value::Array(Self::ohlc_bars(symbol, 5)))
            }
            "list_symbols" => Ok(json!(self.symbols)),
            "read_deals_from_file" => {
                let filename = args["filename"].as_str().unwrap_or("");
                self.deal_files
                    .get(filename)
                    .map(|deals| Value::Array(deals.clone()))
                    .ok_or_else(|| wrap(format!("file not found: {filename}")))
            }
            "validate_and_store_deals" => {
                let files = args["files"].as_array().cloned().unwrap_or_default();
                let file_results: Vec<Value> = files
                    .iter()
                    .map(|file| {
                        let filename = file["filename"].as_str().unwrap_or("");
                        let empty = file["bytes"].as_array().map(Vec::is_empty).unwrap_or(true);
                        if empty {
                            json!({"filename": filename, "success": false, "message": "empty file"})
                        } else {
                            json!({"filename": filename, "success": true, "message": "stored"})
                        }
                    })
                    .collect();
                let all_ok = file_results.iter().all(|r| r["success"] == true);
                Ok(json!({
                    "success": all_ok,
                    "message": format!("{} of {} files stored",
                        file_results.iter().filter(|r| r["success"] == true).count(),
                        file_results.len()),
                    "file_results": file_results,
                }))
            }
            "pull_assets" => Ok(json!({"success": true, "message": "assets up to date"})),
            other => Err(GatewayError::invoke(other, "unknown command")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("🚀 Starting Insight Engine Integration Test");

    let backend = InMemoryBackend::arc();
    let gateway: Arc<dyn CommandGateway> = backend.clone();
    let config = EngineConfig::default();

    // Test 1: single insight execution
    println!("\n📊 Test 1: Single insight execution...");
    let executor =
        InsightExecutor::new(gateway.clone(), "deals.total_balance", json!({}));
    executor.execute().await;
    let state = executor.state();
    assert!(state.error.is_none(), "unexpected error: {:?}", state.error);
    assert_eq!(state.columns, vec!["balance"]);
    println!("✅ deals.total_balance -> {:?}", state.data.unwrap());

    // Test 2: unknown insight surfaces a logical failure as state
    println!("\n🧯 Test 2: Unknown insight id...");
    let bad = InsightExecutor::new(gateway.clone(), "deals.does_not_exist", json!({}));
    bad.execute().await;
    let state = bad.state();
    assert_eq!(state.error.as_deref(), Some("Unknown insight: deals.does_not_exist"));
    assert!(state.data.is_none());
    println!("✅ error surfaced: {}", state.error.unwrap());

    // Test 3: client-side fan-out of independent executors
    println!("\n🔀 Test 3: Concurrent single executions...");
    let executors: Vec<InsightExecutor> =
        ["deals.total_balance", "deals.trade_entries", "deals.profit_by_symbol"]
            .iter()
            .map(|id| InsightExecutor::new(gateway.clone(), *id, json!({})))
            .collect();
    futures::future::join_all(executors.iter().map(InsightExecutor::execute)).await;
    for executor in &executors {
        let state = executor.state();
        assert!(state.error.is_none());
        println!("✅ {} -> {} rows", executor.insight_id(), state.data.unwrap().len());
    }

    // Test 4: batch with partial failure keeps successes
    println!("\n📦 Test 4: Batch execution with partial failure...");
    let batch = BatchInsightExecutor::new(
        gateway.clone(),
        vec![
            InsightConfig::new("deals.total_balance", json!({})),
            InsightConfig::new("deals.missing", json!({})),
            InsightConfig::new("deals.profit_by_symbol", json!({})),
        ],
    );
    batch.execute().await;
    let state = batch.state();
    let results = state.data.expect("batch results");
    assert_eq!(results.len(), 3);
    assert!(results[0].success && !results[1].success && results[2].success);
    assert_eq!(results[1].insight_id, "deals.missing");
    let error = state.error.expect("advisory error");
    assert!(error.starts_with("Some insights failed: deals.missing:"));
    println!("✅ 2/3 succeeded, advisory: {error}");

    // Test 5: selection-driven auto-fetch, one fetch per combined change
    println!("\n📈 Test 5: Selection store and OHLC auto-fetch...");
    SelectionStore::install(SelectionStore::from_config(&config))?;
    let store = SelectionStore::global()?;
    let ohlc = OhlcFetcher::new(gateway.clone(), store.clone());
    let task = ohlc.spawn_auto_fetch();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ohlc.state().data.len(), 5);
    store.set_symbol_and_timeframe("EURUSD", "1H");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = ohlc.state();
    assert!(state.error.is_none());
    println!("✅ refetched {} bars after combined selection change", state.data.len());
    task.abort();

    // Test 6: deals retrieval with filename suffixing
    println!("\n💼 Test 6: Deals retrieval...");
    let deals = DealsFetcher::from_config(gateway.clone(), &config);
    deals.fetch().await;
    let state = deals.state();
    assert!(state.error.is_none());
    assert_eq!(state.data.len(), 3);
    println!("✅ {} deals for account {}", state.data.len(), deals.account());

    // Test 7: remaining gateway commands
    println!("\n🧰 Test 7: Symbols, asset pull, deal import...");
    let symbols_fetcher = SymbolsFetcher::new(gateway.clone());
    symbols_fetcher.fetch_symbols().await;
    assert!(symbols_fetcher.state().has_fetched);
    println!("✅ symbols: {:?}", symbols_fetcher.state().symbols);
    assert_eq!(symbols_fetcher.state().symbols, list_symbols(gateway.as_ref()).await?);

    let pulled = pull_assets(gateway.as_ref()).await?;
    assert!(pulled.success);
    println!("✅ pull_assets: {}", pulled.message);

    let import = validate_and_store_deals(
        gateway.as_ref(),
        vec![
            DealFilePayload { filename: "999.parquet".into(), bytes: vec![0x50, 0x41, 0x52, 0x31] },
            DealFilePayload { filename: "empty.parquet".into(), bytes: Vec::new() },
        ],
    )
    .await?;
    assert!(!import.success);
    assert!(import.file_results[0].success && !import.file_results[1].success);
    println!("✅ import: {}", import.message);

    println!("\n🎉 All integration tests passed");
    Ok(())
}
