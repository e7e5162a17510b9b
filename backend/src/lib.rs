//! Maven Registry - Backend Library
//!
//! Maven repository protocol handler for a project-scoped package registry.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod formats;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
