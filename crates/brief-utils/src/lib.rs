//! Shared utilities for market-brief
//!
//! This crate provides common functionality used across the market-brief
//! workspace: tracing setup and helpers for reading typed settings from the
//! process environment.

pub mod config;
pub mod logging;

pub use config::{EnvError, load_dotenv};
pub use logging::init_tracing;
