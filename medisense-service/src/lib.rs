pub mod agent;
pub mod config;
pub mod models;
pub mod pdf;
pub mod sanitize;
pub mod service;
pub mod speech;
pub mod stages;
pub mod translate;
pub mod upload;
pub mod workflow;

pub use config::AppConfig;
pub use service::{AppState, build_router, create_app};
