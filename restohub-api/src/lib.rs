//! # RestoHub API Server Library
//!
//! HTTP surface of the RestoHub restaurant-management backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors that reject with [`error::ApiError`]
//! - `middleware`: Response security headers
//! - `routes`: API route handlers
//! - `upload`: Multipart form parsing and file checks

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod upload;
