mod admin_routes;
mod analytics_routes;
mod auth_routes;
pub mod config;
mod dashboard_routes;
pub mod error;
mod honeypot;
mod http_layers;
pub mod metrics;
mod ramadan;
pub mod server;
pub mod session;
pub mod state;
mod tracker_routes;

pub use config::ServerConfig;
pub use http_layers::*;
#[allow(unused_imports)] // Used by main.rs
pub use server::{make_app, run_metrics_server, run_server};
