// src/lib.rs
pub mod alerts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod market;
pub mod models;
pub mod service;
pub mod store;
pub mod valuation;

// Re-export commonly used items
pub use db::DatabasePool;
pub use error::{ApiError, Error, Result};
pub use models::*;
pub use service::InvestmentService;
pub use store::{MemoryStore, Store};

use crate::auth::{get_user_data, login, logout};
use crate::config::DemoUser;
use crate::handlers::{
    alerts::{list_alerts, mark_alert_read},
    investments::{create_investment, delete_investment, list_investments, update_investment},
    market::{get_forex_pair, get_stock, list_forex_pairs, list_stocks, set_forex_rate, set_stock_price},
};
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: InvestmentService,
    pub demo_user: Arc<DemoUser>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, demo_user: DemoUser) -> Self {
        AppState {
            service: InvestmentService::new(store),
            demo_user: Arc::new(demo_user),
        }
    }
}

/// All API routes. The caller adds the session layer the handlers rely on.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        // Auth routes
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(get_user_data))
        // Investment routes
        .route("/investments", get(list_investments).post(create_investment))
        .route(
            "/investments/:id",
            patch(update_investment).delete(delete_investment),
        )
        // Alert routes
        .route("/investment-alerts", get(list_alerts))
        .route("/investment-alerts/:id/read", patch(mark_alert_read))
        // Market routes
        .route("/stocks", get(list_stocks))
        .route("/stocks/:id", get(get_stock).patch(set_stock_price))
        .route("/forex", get(list_forex_pairs))
        .route("/forex/:id", get(get_forex_pair).patch(set_forex_rate));

    Router::new().nest("/api", api).with_state(state)
}
