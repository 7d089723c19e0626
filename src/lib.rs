//! Vitrine: a small static site server.
//!
//! Serves a fixed set of assets loaded into memory at startup, a fallback
//! 404 page, and a single JSON health endpoint reporting process uptime.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
