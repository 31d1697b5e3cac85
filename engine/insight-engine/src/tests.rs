//! Scenario tests for the execution core
//!
//! Everything runs against [`MockGateway`], an in-memory gateway with
//! scripted per-command responses and optional latency. Timing-sensitive
//! tests use the paused tokio clock, so overlap scenarios are deterministic.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{BatchInsightExecutor, InsightConfig};
use crate::commands::{pull_assets, validate_and_store_deals, SymbolsFetcher};
use crate::deals::DealsFetcher;
use crate::executor::InsightExecutor;
use crate::gateway::{CommandGateway, GatewayError};
use crate::history::OhlcFetcher;
use crate::selection::SelectionStore;
use crate::types::DealFilePayload;

struct ScriptedResponse {
    delay: Duration,
    result: Result<Value, String>,
}

/// Gateway test double recording invocations and replaying scripted responses
struct MockGateway {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
}

impl MockGateway {
    fn arc() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), responses: Mutex::new(HashMap::new()) })
    }

    fn script(&self, command: &str, result: Result<Value, String>) {
        self.script_delayed(command, Duration::ZERO, result);
    }

    fn script_delayed(&self, command: &str, delay: Duration, result: Result<Value, String>) {
        self.responses
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(ScriptedResponse { delay, result });
    }

    fn calls_for(&self, command: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CommandGateway for MockGateway {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, GatewayError> {
        self.calls.lock().push((command.to_string(), args));
        let scripted = self.responses.lock().get_mut(command).and_then(VecDeque::pop_front);
        let Some(scripted) = scripted else {
            return Err(GatewayError::invoke(command, "no scripted response"));
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result.map_err(|cause| GatewayError::invoke(command, cause))
    }
}

fn insight_ok(rows: Value, columns: &[&str]) -> Value {
    json!({
        "success": true,
        "data": rows,
        "error": null,
        "columns": columns,
    })
}

fn deal_json(ticket: i64, symbol: &str, profit: f64) -> Value {
    json!({
        "ticket": ticket, "order": ticket, "time": 1_700_000_000, "time_msc": 1_700_000_000_000i64,
        "type": 0, "entry": 1, "magic": 0, "position_id": ticket, "reason": 0,
        "volume": 0.1, "price": 151.2, "commission": -0.7, "swap": 0.0,
        "profit": profit, "fee": 0.0, "symbol": symbol, "comment": "", "external_id": ""
    })
}

mod executor_tests {
    use super::*;

    #[tokio::test]
    async fn success_populates_data_and_columns() {
        let gateway = MockGateway::arc();
        gateway.script(
            "execute_insight",
            Ok(insight_ok(json!([{"balance": 1250.5}]), &["balance"])),
        );

        let executor =
            InsightExecutor::new(gateway.clone(), "deals.total_balance", json!({}));
        executor.execute().await;

        let state = executor.state();
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(state.columns, vec!["balance"]);
        assert_eq!(state.data, Some(vec![json!({"balance": 1250.5})]));

        let calls = gateway.calls_for("execute_insight");
        assert_eq!(calls[0]["request"]["insight_id"], "deals.total_balance");
    }

    #[tokio::test]
    async fn empty_insight_id_never_reaches_gateway() {
        let gateway = MockGateway::arc();
        let executor = InsightExecutor::new(gateway.clone(), "  ", json!({}));
        executor.execute().await;

        let state = executor.state();
        assert_eq!(state.error.as_deref(), Some("Insight ID is required"));
        assert_eq!(state.data, None);
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn logical_failure_surfaces_backend_error() {
        let gateway = MockGateway::arc();
        gateway.script(
            "execute_insight",
            Ok(json!({"success": false, "data": null, "error": "file not found", "columns": []})),
        );

        let executor = InsightExecutor::new(gateway, "deals.trade_entries", json!({}));
        executor.execute().await;

        let state = executor.state();
        assert_eq!(state.error.as_deref(), Some("file not found"));
        assert_eq!(state.data, None);
        assert!(state.columns.is_empty());
    }

    #[tokio::test]
    async fn logical_failure_without_message_gets_fallback() {
        let gateway = MockGateway::arc();
        gateway.script(
            "execute_insight",
            Ok(json!({"success": false, "data": null, "error": null, "columns": []})),
        );

        let executor = InsightExecutor::new(gateway, "deals.trade_entries", json!({}));
        executor.execute().await;

        assert_eq!(executor.state().error.as_deref(), Some("Unknown error occurred"));
    }

    #[tokio::test]
    async fn gateway_failure_surfaces_wrapped_message() {
        let gateway = MockGateway::arc();
        gateway.script("execute_insight", Err("backend panicked".to_string()));

        let executor = InsightExecutor::new(gateway, "deals.total_balance", json!({}));
        executor.execute().await;

        let state = executor.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to invoke command 'execute_insight': backend panicked")
        );
        assert_eq!(state.data, None);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_executions_keep_latest_result() {
        let gateway = MockGateway::arc();
        // first dispatch resolves last
        gateway.script_delayed(
            "execute_insight",
            Duration::from_millis(50),
            Ok(insight_ok(json!([{"balance": 1.0}]), &["balance"])),
        );
        gateway.script_delayed(
            "execute_insight",
            Duration::from_millis(5),
            Ok(insight_ok(json!([{"balance": 2.0}]), &["balance"])),
        );

        let executor = InsightExecutor::new(gateway.clone(), "deals.total_balance", json!({}));
        tokio::join!(executor.execute(), executor.execute());

        let state = executor.state();
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(vec![json!({"balance": 2.0})]));
        assert_eq!(gateway.total_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_completion_never_lands_while_newer_in_flight() {
        let gateway = MockGateway::arc();
        // first dispatch resolves while the second is still in flight; its
        // result must be discarded without touching the loading state
        gateway.script_delayed(
            "execute_insight",
            Duration::from_millis(20),
            Ok(insight_ok(json!([{"balance": 1.0}]), &["balance"])),
        );
        gateway.script_delayed(
            "execute_insight",
            Duration::from_millis(100),
            Ok(insight_ok(json!([{"balance": 2.0}]), &["balance"])),
        );

        let executor = InsightExecutor::new(gateway, "deals.total_balance", json!({}));
        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute().await })
        };

        // past the first completion, before the second: state must still be
        // loading with no data flash from the superseded result
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = executor.state();
        assert!(state.is_loading, "stale completion must not end the newer load");
        assert_eq!(state.data, None);

        first.await.unwrap();
        second.await.unwrap();
        let state = executor.state();
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(vec![json!({"balance": 2.0})]));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_execute_keys_on_structural_equality() {
        let gateway = MockGateway::arc();
        gateway.script("execute_insight", Ok(insight_ok(json!([]), &[])));
        gateway.script("execute_insight", Ok(insight_ok(json!([]), &[])));

        let executor = InsightExecutor::new(gateway.clone(), "deals.total_balance", json!({"n": 1}))
            .auto_execute(true);

        // equal value, different instance: must not re-execute
        executor.set_parameters(json!({"n": 1}));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.total_calls(), 0);

        executor.set_parameters(json!({"n": 2}));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.total_calls(), 1);

        executor.set_insight_id("deals.trade_entries");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.total_calls(), 2);
    }
}

mod batch_tests {
    use super::*;

    fn batch_item_ok(insight_id: &str, rows: Value, columns: &[&str]) -> Value {
        json!({
            "insight_id": insight_id,
            "success": true,
            "data": rows,
            "error": null,
            "columns": columns,
        })
    }

    #[tokio::test]
    async fn results_preserve_request_order() {
        let ids =
            ["deals.total_balance", "deals.profit_by_symbol", "deals.balance_entries"];
        let gateway = MockGateway::arc();
        gateway.script(
            "execute_batch_insights",
            Ok(json!({
                "results": ids.iter().map(|&id| batch_item_ok(id, json!([]), &[])).collect::<Vec<_>>()
            })),
        );

        let configs =
            ids.iter().map(|id| InsightConfig::new(*id, json!({}))).collect::<Vec<_>>();
        let executor = BatchInsightExecutor::new(gateway.clone(), configs);
        executor.execute().await;

        let state = executor.state();
        assert_eq!(state.error, None);
        let results = state.data.expect("batch data");
        assert_eq!(results.len(), ids.len());
        for (result, id) in results.iter().zip(ids) {
            assert_eq!(result.insight_id, id);
        }

        // the request carried the same ids, in the same order
        let calls = gateway.calls_for("execute_batch_insights");
        let sent = calls[0]["request"]["requests"].as_array().unwrap();
        let sent_ids: Vec<&str> =
            sent.iter().map(|r| r["insight_id"].as_str().unwrap()).collect();
        assert_eq!(sent_ids, ids);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successes_and_aggregates_error() {
        let gateway = MockGateway::arc();
        gateway.script(
            "execute_batch_insights",
            Ok(json!({
                "results": [
                    batch_item_ok("deals.total_balance", json!([{"balance": 10.0}]), &["balance"]),
                    {
                        "insight_id": "deals.trade_entries",
                        "success": false,
                        "data": null,
                        "error": "file not found",
                        "columns": [],
                    },
                ]
            })),
        );

        let executor = BatchInsightExecutor::new(
            gateway,
            vec![
                InsightConfig::new("deals.total_balance", json!({})),
                InsightConfig::new("deals.trade_entries", json!({})),
            ],
        );
        executor.execute().await;

        let state = executor.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Some insights failed: deals.trade_entries: file not found")
        );
        // advisory only: both items are still present
        let results = state.data.expect("batch data");
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[0].data, Some(vec![json!({"balance": 10.0})]));
        assert!(!results[1].success);
        assert_eq!(results[1].error.as_deref(), Some("file not found"));
    }

    #[tokio::test]
    async fn empty_configuration_fails_locally() {
        let gateway = MockGateway::arc();
        let executor = BatchInsightExecutor::new(gateway.clone(), Vec::new());
        executor.execute().await;

        assert_eq!(
            executor.state().error.as_deref(),
            Some("At least one insight configuration is required")
        );
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn missing_results_field_is_invalid_format() {
        let gateway = MockGateway::arc();
        gateway.script("execute_batch_insights", Ok(json!({"status": "ok"})));

        let executor = BatchInsightExecutor::new(
            gateway,
            vec![InsightConfig::new("deals.total_balance", json!({}))],
        );
        executor.execute().await;

        let state = executor.state();
        assert_eq!(state.error.as_deref(), Some("Invalid response format"));
        assert_eq!(state.data, None);
    }

    #[tokio::test]
    async fn gateway_failure_surfaces_wrapped_message() {
        let gateway = MockGateway::arc();
        gateway.script("execute_batch_insights", Err("connection reset".to_string()));

        let executor = BatchInsightExecutor::new(
            gateway,
            vec![InsightConfig::new("deals.total_balance", json!({}))],
        );
        executor.execute().await;

        let state = executor.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to invoke command 'execute_batch_insights': connection reset")
        );
        assert_eq!(state.data, None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_configs_reexecutes_only_on_real_change() {
        let gateway = MockGateway::arc();
        gateway.script("execute_batch_insights", Ok(json!({"results": []})));

        let configs = vec![InsightConfig::new("deals.total_balance", json!({}))];
        let executor =
            BatchInsightExecutor::new(gateway.clone(), configs.clone()).auto_execute(true);

        executor.set_configs(configs);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.total_calls(), 0);

        executor.set_configs(vec![InsightConfig::new("deals.all_entries", json!({}))]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.total_calls(), 1);
    }
}

mod selection_tests {
    use super::*;

    #[test]
    fn global_store_fails_fast_before_install() {
        // single test owning the process-wide store: order within matters
        let err = SelectionStore::global().unwrap_err();
        assert!(err.to_string().contains("not installed"));

        SelectionStore::install(SelectionStore::new()).unwrap();
        assert_eq!(SelectionStore::global().unwrap().get().symbol, "USDJPY");

        // a second install is a configuration error
        assert!(SelectionStore::install(SelectionStore::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn combined_mutation_triggers_exactly_one_fetch() {
        let gateway = MockGateway::arc();
        gateway.script("retrieve_asset_ochl", Ok(json!([])));
        gateway.script(
            "retrieve_asset_ochl",
            Ok(json!([{"time": 1, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}])),
        );

        let store = SelectionStore::new();
        let fetcher = OhlcFetcher::new(gateway.clone(), store.clone());
        let task = fetcher.spawn_auto_fetch();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.calls_for("retrieve_asset_ochl").len(), 1);

        store.set_symbol_and_timeframe("EURUSD", "1H");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let calls = gateway.calls_for("retrieve_asset_ochl");
        assert_eq!(calls.len(), 2, "combined mutation must trigger one fetch, not two");
        assert_eq!(calls[1], json!({"symbol": "EURUSD", "timeframe": "1H"}));

        let state = fetcher.state();
        assert_eq!(state.data.len(), 1);
        assert_eq!(state.error, None);
        task.abort();
    }
}

mod fetcher_tests {
    use super::*;

    #[tokio::test]
    async fn blank_symbol_or_timeframe_fails_locally() {
        let gateway = MockGateway::arc();
        let fetcher = OhlcFetcher::new(gateway.clone(), SelectionStore::new());

        fetcher.fetch_with("  ", "1H").await;
        assert_eq!(
            fetcher.state().error.as_deref(),
            Some("Symbol and timeframe are required")
        );
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn inputs_are_trimmed_before_dispatch() {
        let gateway = MockGateway::arc();
        gateway.script("retrieve_asset_ochl", Ok(json!([])));

        let fetcher = OhlcFetcher::new(gateway.clone(), SelectionStore::new());
        fetcher.fetch_with(" EURUSD ", " 1H ").await;

        assert_eq!(
            gateway.calls_for("retrieve_asset_ochl")[0],
            json!({"symbol": "EURUSD", "timeframe": "1H"})
        );
    }

    #[tokio::test]
    async fn deals_account_gets_file_suffix() {
        let gateway = MockGateway::arc();
        gateway.script("read_deals_from_file", Ok(json!([deal_json(1, "USDJPY", 4.2)])));

        let fetcher = DealsFetcher::new(gateway.clone(), "5043757397");
        fetcher.fetch().await;

        assert_eq!(
            gateway.calls_for("read_deals_from_file")[0],
            json!({"filename": "5043757397.parquet"})
        );
        let state = fetcher.state();
        assert_eq!(state.data.len(), 1);
        assert_eq!(state.data[0].symbol, "USDJPY");
    }

    #[tokio::test]
    async fn deals_suffix_not_doubled() {
        let gateway = MockGateway::arc();
        gateway.script("read_deals_from_file", Ok(json!([])));

        let fetcher = DealsFetcher::new(gateway.clone(), "1234.parquet");
        fetcher.fetch().await;

        assert_eq!(
            gateway.calls_for("read_deals_from_file")[0],
            json!({"filename": "1234.parquet"})
        );
    }

    #[tokio::test]
    async fn deals_blank_account_fails_locally() {
        let gateway = MockGateway::arc();
        let fetcher = DealsFetcher::new(gateway.clone(), "");
        fetcher.fetch().await;

        assert_eq!(fetcher.state().error.as_deref(), Some("Account number is required"));
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn deals_rebinds_account_on_success() {
        let gateway = MockGateway::arc();
        gateway.script("read_deals_from_file", Ok(json!([])));

        let fetcher = DealsFetcher::new(gateway.clone(), "5043757397");
        fetcher.fetch_account(" 999 ").await;

        assert_eq!(fetcher.account(), "999");
        assert_eq!(
            gateway.calls_for("read_deals_from_file")[0],
            json!({"filename": "999.parquet"})
        );
    }

    #[tokio::test]
    async fn deals_failure_clears_data() {
        let gateway = MockGateway::arc();
        gateway.script("read_deals_from_file", Ok(json!([deal_json(1, "USDJPY", 4.2)])));
        gateway.script("read_deals_from_file", Err("file not found".to_string()));

        let fetcher = DealsFetcher::new(gateway, "5043757397");
        fetcher.fetch().await;
        assert_eq!(fetcher.state().data.len(), 1);

        fetcher.fetch().await;
        let state = fetcher.state();
        assert!(state.data.is_empty());
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to invoke command 'read_deals_from_file': file not found")
        );
    }
}

mod command_tests {
    use super::*;

    #[tokio::test]
    async fn symbols_fetcher_marks_has_fetched_either_way() {
        let gateway = MockGateway::arc();
        gateway.script("list_symbols", Ok(json!(["USDJPY", "EURUSD"])));

        let fetcher = SymbolsFetcher::new(gateway.clone());
        assert!(!fetcher.state().has_fetched);

        fetcher.fetch_symbols().await;
        let state = fetcher.state();
        assert!(state.has_fetched);
        assert_eq!(state.symbols, vec!["USDJPY", "EURUSD"]);

        // next call is unscripted and fails; has_fetched stays set
        fetcher.fetch_symbols().await;
        let state = fetcher.state();
        assert!(state.has_fetched);
        assert!(state.symbols.is_empty());
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn pull_assets_decodes_result() {
        let gateway = MockGateway::arc();
        gateway.script("pull_assets", Ok(json!({"success": true, "message": "assets updated"})));

        let result = pull_assets(gateway.as_ref()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.message, "assets updated");
    }

    #[tokio::test]
    async fn validate_and_store_deals_sends_file_payloads() {
        let gateway = MockGateway::arc();
        gateway.script(
            "validate_and_store_deals",
            Ok(json!({
                "success": true,
                "message": "1 file stored",
                "file_results": [
                    {"filename": "999.parquet", "success": true, "message": "stored"}
                ]
            })),
        );

        let files = vec![DealFilePayload {
            filename: "999.parquet".to_string(),
            bytes: vec![0x50, 0x41, 0x52, 0x31],
        }];
        let result = validate_and_store_deals(gateway.as_ref(), files).await.unwrap();
        assert!(result.success);
        assert_eq!(result.file_results.len(), 1);

        let calls = gateway.calls_for("validate_and_store_deals");
        assert_eq!(calls[0]["files"][0]["filename"], "999.parquet");
    }
}
