//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with bearer-token session management and helpers for the
//! endpoints tests exercise. When routes or request formats change, update
//! only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
    /// Bearer token attached to every request once logged in.
    pub token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client logged in as the standard test user.
    pub async fn authenticated(base_url: String) -> Self {
        let mut client = Self::new(base_url);
        client.login_as(TEST_USER, TEST_PASS).await;
        client
    }

    /// Creates a client logged in as the admin.
    pub async fn authenticated_admin(base_url: String) -> Self {
        let mut client = Self::new(base_url);
        client.login_as(ADMIN_USER, ADMIN_PASS).await;
        client
    }

    /// Logs in and stores the returned token. Panics on failure; a broken
    /// login here is a test infrastructure problem.
    pub async fn login_as(&mut self, identifier: &str, password: &str) {
        let response = self.login(identifier, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Login failed for {}",
            identifier
        );
        let body: Value = response.json().await.expect("Login response not JSON");
        let token = body["token"].as_str().expect("Login response without token");
        self.token = Some(token.to_string());
    }

    fn with_token(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// GET with the session token attached.
    pub async fn get(&self, path: &str) -> Response {
        self.with_token(self.client.get(format!("{}{}", self.base_url, path)))
            .send()
            .await
            .expect("GET request failed")
    }

    /// POST a JSON body with the session token attached.
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.with_token(self.client.post(format!("{}{}", self.base_url, path)))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// POST /api/auth/login (does not store the token)
    pub async fn login(&self, identifier: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// POST /api/auth/register
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/api/auth/register", self.base_url))
            .json(&json!({
                "username": username,
                "email": email,
                "password": password,
                "gender": "Male",
                "age": 30,
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    // ========================================================================
    // Trackers
    // ========================================================================

    pub async fn log_taraweeh(&self, date: &str, completed: bool, rakaat: i64) -> Response {
        self.post_json(
            "/api/taraweeh/log",
            &json!({ "date": date, "completed": completed, "rakaat": rakaat }),
        )
        .await
    }

    pub async fn log_fasting(&self, date: &str, completed: bool) -> Response {
        self.post_json(
            "/api/fasting/log",
            &json!({ "date": date, "completed": completed }),
        )
        .await
    }

    pub async fn log_namaz(&self, date: &str, prayer: &str, location: &str) -> Response {
        self.post_json(
            "/api/namaz/log",
            &json!({ "date": date, "prayer": prayer, "location": location }),
        )
        .await
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    /// GET /api/dashboard/{year}, returning the summaries array.
    pub async fn dashboard_summaries(&self, year: i32) -> Vec<Value> {
        let response = self.get(&format!("/api/dashboard/{}", year)).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Dashboard response not JSON");
        body["summaries"]
            .as_array()
            .expect("Dashboard without summaries")
            .clone()
    }

    /// One user's summary row from the dashboard.
    pub async fn dashboard_summary_for(&self, year: i32, username: &str) -> Value {
        self.dashboard_summaries(year)
            .await
            .into_iter()
            .find(|summary| summary["username"] == username)
            .unwrap_or_else(|| panic!("No dashboard summary for {}", username))
    }

    // ========================================================================
    // Telemetry feeds (admin)
    // ========================================================================

    /// GET /api/analytics/anomalies, returning the anomalies array.
    pub async fn anomalies(&self) -> Vec<Value> {
        let response = self.get("/api/analytics/anomalies").await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Anomaly feed not JSON");
        body["anomalies"]
            .as_array()
            .expect("Anomaly feed without anomalies")
            .clone()
    }

    /// Anomalies of one type.
    pub async fn anomalies_of_type(&self, anomaly_type: &str) -> Vec<Value> {
        self.anomalies()
            .await
            .into_iter()
            .filter(|a| a["anomalyType"] == anomaly_type)
            .collect()
    }
}
