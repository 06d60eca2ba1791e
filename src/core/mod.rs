//! Core business logic module
//!
//! This module contains the domain models, the downloader and smart converter,
//! external tool discovery and the background job manager.

pub mod config;
pub mod converter;
pub mod downloader;
pub mod jobs;
pub mod models;
pub mod progress;
pub mod tools;

#[cfg(test)]
mod config_test;


#[cfg(test)]
mod jobs_integration_tests;

// Re-export commonly used types
pub use config::AppConfig;
pub use jobs::JobManager;
