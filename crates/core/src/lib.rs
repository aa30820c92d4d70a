//! Loreweaver Core Library
//!
//! This crate provides the foundational utilities for the Loreweaver
//! knowledge base:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management and embedding-backend resolution

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, BackendDescriptor, RemoteService};
pub use error::{AppError, AppResult};
