//! Request handler module
//!
//! Routing dispatch, the in-memory asset store, and the health payload.

pub mod assets;
pub mod health;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
