//! HTTP route modules for the exchange API.
//!
//! - `auth`: registration, sessions, sign-out
//! - `profile`: the caller's profile and linked social accounts
//! - `tasks`: the availability feed and owner task management
//! - `rewards`: the two ledger claim procedures
//! - `admin`: moderation surface (admin role required)

pub mod admin;
pub mod auth;
pub mod profile;
pub mod rewards;
pub mod tasks;
