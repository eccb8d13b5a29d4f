//! WireCanvas Application
//!
//! A winit/Vello window around a [`wirecanvas_core::Canvas`], plus a
//! headless runner that replays scripted pointer sessions.

#[cfg(feature = "native")]
mod app;
pub mod options;
pub mod session;

use thiserror::Error;
use wirecanvas_core::ConfigError;

#[cfg(feature = "native")]
pub use app::{App, AppConfig};
pub use options::Options;
pub use session::{Session, SessionSummary, Step};

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
