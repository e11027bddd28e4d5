//! IR Gadgets catalog API
//!
//! Serves the storefront's service catalog and stores contact-form
//! inquiries in PostgreSQL, or in a local SQLite file when no PostgreSQL
//! connection string is configured.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod security;
pub mod seed;
pub mod storage;
pub mod validation;
