use anyhow::Result;
use axum::Router;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    api,
    config::Config,
    db::{self, store::ReadingStore},
    ingest::IngestService,
    query::QueryService,
    scheduler::{ScheduleSettings, Scheduler},
    vrm::VrmClient,
};

/// Everything the process owns between startup and shutdown.
///
/// The upstream client lives inside the ingest service held by the
/// scheduler and the query service; it is released once both are dropped.
pub struct App {
    pool: SqlitePool,
    scheduler: Scheduler,
    query: QueryService,
    cors_origins: Vec<String>,
}

impl App {
    /// Open the store, build the upstream client and start the background
    /// loops. Missing VRM credentials are not fatal: the app starts in
    /// degraded mode and only serves what is already stored.
    pub async fn start(config: &Config) -> Result<Self> {
        let pool = db::create_pool(&config.database_url).await?;
        db::run_migrations(&pool).await?;
        info!("Database ready");

        let store = ReadingStore::new(pool.clone());

        let ingest = match VrmClient::new(&config.vrm) {
            Ok(vrm) => {
                info!(installation_id = %vrm.installation_id(), "VRM client configured");
                Some(IngestService::new(
                    store.clone(),
                    vrm,
                    config.store_raw_payload,
                ))
            }
            Err(e) => {
                warn!(error = %e, "VRM client unavailable, running without data collection");
                None
            }
        };

        let settings =
            ScheduleSettings::from_secs(config.fetch_interval_secs, config.retention_interval_secs);
        let scheduler = Scheduler::start(ingest.clone(), store.clone(), settings).await;
        let query = QueryService::new(store, config.battery, ingest);

        Ok(Self {
            pool,
            scheduler,
            query,
            cors_origins: config.cors_origins.clone(),
        })
    }

    pub fn router(&self) -> Router {
        api::router(self.query.clone(), &self.cors_origins)
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Stop the loops, then close the pool.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        drop(self.query);
        self.pool.close().await;
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{config::VrmSettings, metrics::BatteryConfig};

    fn config(database_url: String) -> Config {
        Config {
            database_url,
            server_host: "127.0.0.1".to_owned(),
            server_port: 0,
            vrm: VrmSettings {
                token: None,
                installation_id: None,
                base_url: "http://127.0.0.1:9".to_owned(),
                timeout_secs: 1,
            },
            battery: BatteryConfig::default(),
            fetch_interval_secs: 60,
            retention_interval_secs: 3600,
            store_raw_payload: false,
            cors_origins: Vec::new(),
        }
    }

    /// Fresh database location; removed when the returned dir is dropped.
    fn temp_db() -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("data/readings.db").display());
        (dir, url)
    }

    #[tokio::test]
    async fn starts_in_degraded_mode_without_credentials() {
        let (_dir, url) = temp_db();
        let app = App::start(&config(url)).await.unwrap();
        assert!(!app.query().vrm_connected());
        assert!(app.query().current().await.unwrap().is_none());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn first_fetch_runs_on_startup_with_credentials() {
        let mut upstream = mockito::Server::new_async().await;
        let mock = upstream
            .mock("GET", "/installations/55/diagnostics")
            .with_status(200)
            .with_body(r#"{"records": [{"code": "bv", "rawValue": 13.1}]}"#)
            .create_async()
            .await;

        let (_dir, url) = temp_db();
        let mut config = config(url);
        config.vrm = VrmSettings {
            token: Some("secret".to_owned()),
            installation_id: Some("55".to_owned()),
            base_url: upstream.url(),
            timeout_secs: 5,
        };

        let app = App::start(&config).await.unwrap();
        assert!(app.query().vrm_connected());

        let stored = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            loop {
                if let Some(current) = app.query().current().await.unwrap() {
                    break current;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("no reading stored after startup");

        assert_eq!(stored.reading.battery_voltage, Some(13.1));
        mock.assert_async().await;
        app.shutdown().await;
    }
}
