//! # RestoHub Shared Library
//!
//! Domain types, persistence and integrations used by the RestoHub API.
//!
//! ## Module Organization
//!
//! - `models`: tables and their queries
//! - `auth`: passwords, tokens, one-time codes, Google sign-in, request auth
//! - `billing`: payment processor client and webhook verification
//! - `mail`: one-time code delivery
//! - `storage`: uploaded file storage
//! - `db`: connection pool and migrations

pub mod auth;
pub mod billing;
pub mod db;
pub mod mail;
pub mod models;
pub mod storage;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
