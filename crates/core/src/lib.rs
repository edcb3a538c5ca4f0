//! Ecom Core - Shared domain types.
//!
//! This crate provides the types used across the e-commerce components:
//! - `api` - REST backend consumed by the storefront SPA and partners
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//! - `integration-tests` - End-to-end tests against a running server
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money, statuses, pagination and slugs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
