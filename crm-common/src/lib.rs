//! # CRM Common Library
//!
//! Shared code for the CRM services including:
//! - Database bootstrap, models and typed repositories
//! - The primary-flag toggler that keeps one primary row per group
//! - Password hashing and session tokens
//! - Configuration resolution and logging bootstrap

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
