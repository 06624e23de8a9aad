//! Shelfshare server
//!
//! Personal-library sharing: users lend books to friends. This crate holds
//! the lending and friendship workflow, the notification inbox that carries
//! its events, the reminder scanner, and the REST JSON API in front of them.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn repository::DirectoryStore>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Build the state and every service over `store`
    pub fn new(
        config: AppConfig,
        store: Arc<dyn repository::DirectoryStore>,
        mailer: Arc<dyn services::email::Mailer>,
    ) -> Self {
        let services = services::Services::new(store.clone(), mailer, &config);
        Self {
            config: Arc::new(config),
            store,
            services: Arc::new(services),
        }
    }
}
