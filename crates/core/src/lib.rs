//! Sift Core Library
//!
//! This crate provides the foundational utilities shared by every Sift crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (workspace, retrieval and embedding settings)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, EmbeddingSettings, RetrievalSettings};
pub use error::{AppError, AppResult};
