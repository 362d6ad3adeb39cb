//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Login, registration, profile changes and session lifecycle
//! - `cart` - Backend cart operations with a session mirror
//! - `flash` - One-shot notices for the next page

pub mod auth;
pub mod cart;
pub mod flash;
