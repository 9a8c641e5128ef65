use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::services::ServeDir;
use tracing::debug;

use super::http_layers::{
    log_requests, observe_requests, IpKeyExtractor, LOGIN_BURST, LOGIN_REFILL_SECONDS,
};
#[cfg(feature = "slowdown")]
use super::http_layers::slowdown_request;
use super::metrics::metrics_handler;
use super::state::*;
use super::{
    admin_routes, analytics_routes, auth_routes, dashboard_routes, honeypot, ramadan,
    tracker_routes, ServerConfig,
};
use axum::extract::State;

use crate::telemetry::AnomalyDetector;
use crate::user::AuthKeys;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Json<ServerStats> {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_announcement(State(state): State<ServerState>) -> Json<Value> {
    let message = state
        .tracker_store
        .get_setting("announcement")
        .unwrap_or_else(|err| {
            debug!("Failed to read announcement: {}", err);
            None
        })
        .unwrap_or_default();
    Json(json!({ "success": true, "message": message }))
}

pub async fn make_app(
    config: ServerConfig,
    user_store: GuardedUserStore,
    tracker_store: GuardedTrackerStore,
    telemetry_store: GuardedTelemetryStore,
    auth_keys: AuthKeys,
) -> Result<Router> {
    let detector = Arc::new(AnomalyDetector::new(telemetry_store.clone()));
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        user_store,
        tracker_store,
        telemetry_store,
        detector,
        auth_keys,
    };

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(LOGIN_REFILL_SECONDS)
            .burst_size(LOGIN_BURST)
            .key_extractor(IpKeyExtractor)
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    let auth_router: Router = Router::new()
        .route("/register", post(auth_routes::register))
        .route("/login", post(auth_routes::login))
        .route("/change-password", post(auth_routes::change_password))
        .layer(GovernorLayer::new(governor_config))
        .with_state(state.clone());

    let tracker_router: Router = Router::new()
        .route("/taraweeh/log", post(tracker_routes::log_taraweeh))
        .route("/taraweeh/{username}/{year}", get(tracker_routes::get_taraweeh))
        .route("/fasting/log", post(tracker_routes::log_fasting))
        .route("/fasting/{username}/{year}", get(tracker_routes::get_fasting))
        .route("/azkar/log", post(tracker_routes::log_azkar))
        .route("/azkar/{username}/{year}", get(tracker_routes::get_azkar))
        .route("/namaz/log", post(tracker_routes::log_namaz))
        .route(
            "/namaz/{username}/{year}/{month}",
            get(tracker_routes::get_namaz),
        )
        .route("/quran/create", post(tracker_routes::create_khatam))
        .route("/quran/{username}/{year}", get(tracker_routes::get_khatams))
        .route("/quran/toggle-para", post(tracker_routes::toggle_para))
        .route("/quran/delete", post(tracker_routes::delete_khatam))
        .route("/surah/add", post(tracker_routes::add_surah))
        .route("/surah/update", post(tracker_routes::update_surah))
        .route("/surah/delete", post(tracker_routes::delete_surah))
        .route("/surah/{username}", get(tracker_routes::get_surahs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tracker_routes::frozen_guard,
        ))
        .with_state(state.clone());

    let admin_router: Router = Router::new()
        .route("/users", get(admin_routes::get_users))
        .route("/reset-password", post(admin_routes::reset_password))
        .route("/change-role", post(admin_routes::change_role))
        .route("/delete-user", post(admin_routes::delete_user))
        .route("/set-multiplier", post(admin_routes::set_multiplier))
        .route("/set-frozen", post(admin_routes::set_frozen))
        .route("/export/{year}", get(admin_routes::export_year))
        .route(
            "/weights",
            get(admin_routes::get_weights).post(admin_routes::update_weights),
        )
        .route("/weights/reset", post(admin_routes::reset_weights))
        .route("/announcement", post(admin_routes::set_announcement))
        .with_state(state.clone());

    let analytics_router: Router = Router::new()
        .route("/fingerprint", post(analytics_routes::post_fingerprint))
        .route("/events", post(analytics_routes::post_events))
        .route("/anomalies", get(analytics_routes::get_anomalies))
        .route("/honeypot-log", get(analytics_routes::get_honeypot_log))
        .route("/requests", get(analytics_routes::get_request_log))
        .route(
            "/fingerprint-scores",
            get(analytics_routes::get_fingerprint_scores),
        )
        .route("/typing/{username}", get(analytics_routes::get_typing_profiles))
        .route("/admin-audit", get(analytics_routes::get_admin_audit))
        .with_state(state.clone());

    let api_router: Router = Router::new()
        .route("/announcement", get(get_announcement))
        .route("/dashboard/{year}", get(dashboard_routes::get_dashboard))
        .route("/ramadan/{year}", get(ramadan::get_ramadan_dates))
        // Honeypots under /api
        .route("/export", get(honeypot::fake_export))
        .route("/users/all", get(honeypot::fake_users_all))
        .route("/debug", get(honeypot::fake_debug))
        .with_state(state.clone())
        .nest("/auth", auth_router)
        .merge(tracker_router)
        .nest("/admin", admin_router)
        .nest("/analytics", analytics_router);

    // Honeypots outside /api, mimicking an exposed ops surface
    let honeypot_router: Router = Router::new()
        .route("/admin/backup", get(honeypot::fake_backup))
        .route("/admin/dump", get(honeypot::fake_dump))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/api", api_router)
        .merge(honeypot_router);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));
    // Outermost so it sees the final status of every request
    app = app.layer(middleware::from_fn_with_state(state, observe_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    user_store: GuardedUserStore,
    tracker_store: GuardedTrackerStore,
    telemetry_store: GuardedTelemetryStore,
    auth_keys: AuthKeys,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, user_store, tracker_store, telemetry_store, auth_keys).await?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    Ok(axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?)
}

pub async fn run_metrics_server(port: u16) -> Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))?;
    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SqliteTelemetryStore;
    use crate::tracker::SqliteTrackerStore;
    use crate::user::SqliteUserStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt; // for `oneshot`

    async fn test_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let user_store = Arc::new(SqliteUserStore::new(dir.path().join("user.db")).unwrap());
        let tracker_store =
            Arc::new(SqliteTrackerStore::new(dir.path().join("tracker.db")).unwrap());
        let telemetry_store =
            Arc::new(SqliteTelemetryStore::new(dir.path().join("telemetry.db")).unwrap());
        let app = make_app(
            ServerConfig {
                requests_logging_level: super::super::RequestsLoggingLevel::None,
                ..Default::default()
            },
            user_store,
            tracker_store,
            telemetry_store,
            AuthKeys::new("unit-test-secret"),
        )
        .await
        .unwrap();
        (dir, app)
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let (_dir, app) = test_app().await;

        let protected_routes = vec![
            "/api/dashboard/2026",
            "/api/taraweeh/umar/2026",
            "/api/quran/umar/2026",
            "/api/surah/umar",
            "/api/ramadan/2026",
            "/api/admin/users",
            "/api/analytics/anomalies",
        ];

        for route in protected_routes {
            let request = Request::builder().uri(route).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "route {}",
                route
            );
        }
    }

    #[tokio::test]
    async fn home_and_announcement_are_public() {
        let (_dir, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/announcement")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

}
