//! Run orchestration: fetch → parse → filter → group → dispatch, under one deadline.

use std::sync::Arc;
use std::time::Duration;

use playerwatch_core::config::DataConfig;
use playerwatch_core::{
    Notifier, PlayerSource, PlayerwatchConfig, PlayerwatchError, Result, Trigger,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::Instrument;

use crate::cluster::by_store_number;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::filter::{FilterConfig, PlayerFilter};
use crate::player::PlayerParser;

/// Counts from one finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub trigger: Trigger,
    pub all_players: usize,
    pub offline_players: usize,
    pub stores: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
}

/// Trigger-level result: `{"statusCode": 200, "body": "Successful response"}`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

impl RunResponse {
    pub fn from_result(result: Result<RunSummary>) -> Self {
        match result {
            Ok(summary) => Self {
                status_code: 200,
                body: "Successful response".into(),
                summary: Some(summary),
            },
            Err(e) => Self {
                status_code: 500,
                body: e.to_string(),
                summary: None,
            },
        }
    }
}

/// The offline-player pipeline with its collaborators wired in.
pub struct Pipeline {
    source: Arc<dyn PlayerSource>,
    notifier: Arc<dyn Notifier>,
    data: DataConfig,
    max_concurrency: usize,
    run_timeout: Duration,
    running: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn PlayerSource>,
        notifier: Arc<dyn Notifier>,
        config: &PlayerwatchConfig,
    ) -> Self {
        Self {
            source,
            notifier,
            data: config.data.clone(),
            max_concurrency: config.app.max_concurrency,
            run_timeout: config.app.run_timeout,
            running: Mutex::new(()),
        }
    }

    /// Execute one run. Per-record and per-store problems are logged and
    /// absorbed; only fetch, payload and deadline failures are returned.
    ///
    /// Runs are serialized: a second trigger waits for the current run.
    pub async fn run(&self, trigger: Trigger) -> Result<RunSummary> {
        let _running = self.running.lock().await;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id, trigger = %trigger);
        self.execute(run_id, trigger)
            .instrument(span)
            .await
    }

    async fn execute(&self, run_id: String, trigger: Trigger) -> Result<RunSummary> {
        let start = Instant::now();
        let deadline = start + self.run_timeout;
        tracing::info!("🚀 Starting run");

        let body = tokio::time::timeout_at(deadline, self.source.fetch())
            .await
            .map_err(|_| PlayerwatchError::DeadlineExceeded("fetch".into()))??;

        let parser = PlayerParser::new(&self.data, tracing::debug_span!("parser"));
        let all_players = parser.parse_players(&body)?;
        let all_count = all_players.len();

        let filter = PlayerFilter::new(
            FilterConfig::from_data(&self.data),
            tracing::debug_span!("filter"),
        );
        let players = filter.filter(all_players);
        let offline = players.len();

        let stores = by_store_number(players);
        let store_count = stores.len();

        if Instant::now() >= deadline {
            return Err(PlayerwatchError::DeadlineExceeded("processing".into()));
        }

        let dispatcher = Dispatcher::new(
            self.notifier.clone(),
            self.max_concurrency,
            tracing::info_span!("dispatch"),
        );
        let report: DispatchReport = dispatcher.dispatch(stores, Some(deadline)).await;

        let summary = RunSummary {
            run_id,
            trigger,
            all_players: all_count,
            offline_players: offline,
            stores: store_count,
            sent: report.sent(),
            failed: report.failed(),
            skipped: report.skipped(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            offline_players = summary.offline_players,
            all_players = summary.all_players,
            stores = summary.stores,
            failed = summary.failed,
            skipped = summary.skipped,
            "✅ Run finished in {}ms",
            summary.elapsed_ms
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use playerwatch_core::Player;
    use std::sync::Mutex;

    struct StaticSource(Result<Vec<u8>>);

    #[async_trait]
    impl PlayerSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            match &self.0 {
                Ok(body) => Ok(body.clone()),
                Err(e) => Err(PlayerwatchError::Http(e.to_string())),
            }
        }
    }

    struct SlowSource;

    #[async_trait]
    impl PlayerSource for SlowSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(b"[]".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, Vec<i64>)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, store_number: i64, players: &[Player]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((store_number, players.iter().map(|p| p.id).collect()));
            if store_number == 30 {
                return Err(PlayerwatchError::Mail("mailbox full".into()));
            }
            Ok(())
        }
    }

    fn config() -> PlayerwatchConfig {
        let mut cfg = PlayerwatchConfig::default();
        cfg.data.allowed_companies = vec!["Acme".into()];
        cfg.data.companies = [("acme".to_string(), "Acme".to_string())].into();
        cfg.data.ignored_tags = vec!["demo".into()];
        cfg.data.store_test_number = 999;
        cfg.app.max_concurrency = 2;
        cfg
    }

    fn hours_ago(h: i64) -> String {
        (Utc::now() - TimeDelta::hours(h))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn payload() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!([
            {"id": "1", "f_tag": "store:10,company:acme", "timezone_diff": "0", "last_online": hours_ago(72)},
            {"id": "2", "f_tag": "store:10,company:acme", "timezone_diff": "0", "last_online": hours_ago(100)},
            {"id": "3", "f_tag": "store:20,company:acme", "timezone_diff": "0", "last_online": hours_ago(1)},
            {"id": "4", "f_tag": "store:30,company:acme", "timezone_diff": "0", "last_online": hours_ago(72)},
            {"id": "5", "f_tag": "store:40,company:acme,demo", "timezone_diff": "0", "last_online": hours_ago(72)},
            {"id": "x", "f_tag": "store:50,company:acme", "timezone_diff": "0", "last_online": hours_ago(72)},
            {"id": "7", "f_tag": "store:999,company:acme", "timezone_diff": "0", "last_online": hours_ago(72)}
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_run() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Pipeline::new(
            Arc::new(StaticSource(Ok(payload()))),
            notifier.clone(),
            &config(),
        );

        let summary = pipeline.run(Trigger::Manual).await.unwrap();

        assert_eq!(summary.all_players, 6);
        assert_eq!(summary.offline_players, 4);
        assert_eq!(summary.stores, 3);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);

        let mut sent = notifier.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec![(0, vec![7]), (10, vec![1, 2]), (30, vec![4])]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let pipeline = Pipeline::new(
            Arc::new(StaticSource(Err(PlayerwatchError::Http("502".into())))),
            Arc::new(RecordingNotifier::default()),
            &config(),
        );
        let err = pipeline.run(Trigger::Timer).await.unwrap_err();
        assert!(matches!(err, PlayerwatchError::Http(_)));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_fatal() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Pipeline::new(
            Arc::new(StaticSource(Ok(b"<html>".to_vec()))),
            notifier.clone(),
            &config(),
        );
        let err = pipeline.run(Trigger::Http).await.unwrap_err();
        assert!(matches!(err, PlayerwatchError::Payload(_)));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_bound_by_deadline() {
        let mut cfg = config();
        cfg.app.run_timeout = Duration::from_millis(50);
        let pipeline = Pipeline::new(
            Arc::new(SlowSource),
            Arc::new(RecordingNotifier::default()),
            &cfg,
        );
        let err = pipeline.run(Trigger::Manual).await.unwrap_err();
        assert!(matches!(err, PlayerwatchError::DeadlineExceeded(_)));
    }

    #[test]
    fn test_run_response_json() {
        let ok = RunResponse::from_result(Err(PlayerwatchError::Http("Bad Gateway".into())));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["body"], "HTTP error: Bad Gateway");
        assert!(json.get("summary").is_none());
    }
}
