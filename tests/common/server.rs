//! Test server lifecycle management
//!
//! Each test gets an isolated server on a random port with its own SQLite
//! databases in a temp directory.

use super::constants::*;
use super::fixtures::create_test_users;
use ramadanflow_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use ramadanflow_server::telemetry::{SqliteTelemetryStore, TelemetryStore};
use ramadanflow_server::tracker::{SqliteTrackerStore, TrackerStore};
use ramadanflow_server::user::{AuthKeys, SqliteUserStore, UserStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Direct store handles for assertions and fixture setup
    pub user_store: Arc<dyn UserStore>,
    pub tracker_store: Arc<dyn TrackerStore>,
    pub telemetry_store: Arc<dyn TelemetryStore>,

    // Keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with the standard fixture users seeded.
    pub async fn spawn() -> Self {
        let server = Self::spawn_empty().await;
        create_test_users(server.user_store.as_ref()).expect("Failed to seed test users");
        server
    }

    /// Spawns a server with no users at all (for first-user-is-admin tests).
    pub async fn spawn_empty() -> Self {
        let temp_db_dir = tempfile::tempdir().expect("Failed to create temp dir");

        let user_store: Arc<dyn UserStore> = Arc::new(
            SqliteUserStore::new(temp_db_dir.path().join("user.db"))
                .expect("Failed to open user store"),
        );
        let tracker_store: Arc<dyn TrackerStore> = Arc::new(
            SqliteTrackerStore::new(temp_db_dir.path().join("tracker.db"))
                .expect("Failed to open tracker store"),
        );
        let telemetry_store: Arc<dyn TelemetryStore> = Arc::new(
            SqliteTelemetryStore::new(temp_db_dir.path().join("telemetry.db"))
                .expect("Failed to open telemetry store"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let app = make_app(
            config,
            user_store.clone(),
            tracker_store.clone(),
            telemetry_store.clone(),
            AuthKeys::new("e2e-test-secret"),
        )
        .await
        .expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            user_store,
            tracker_store,
            telemetry_store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to answer on the stats endpoint.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
