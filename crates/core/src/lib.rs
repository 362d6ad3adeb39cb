//! Robostore Core - Shared domain types.
//!
//! This crate provides the types used across all Robostore components:
//! - `storefront` - Public store and admin console (server-rendered)
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The records
//! in [`models`] mirror the JSON the external backend service emits, so they
//! can be decoded directly from its responses.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, timestamps and statuses
//! - [`models`] - Backend entities: users, products, cart items, orders, stock movements

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
