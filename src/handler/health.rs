//! Health status module
//!
//! Synthetic liveness payload: process status, current time, and uptime.
//! Recomputed on every request; never touches the asset store.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::time::Instant;

/// Process start marker captured once at state construction
#[derive(Debug, Clone, Copy)]
pub struct StartTime(Instant);

impl StartTime {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Seconds elapsed since process start
    pub fn uptime_secs(&self) -> f64 {
        self.0.elapsed().as_secs_f64()
    }
}

/// Health check payload serialized to JSON
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: f64,
}

impl HealthStatus {
    /// Compute the current health status for this process
    pub fn current(started: &StartTime) -> Self {
        Self {
            status: "OK",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: started.uptime_secs(),
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> String {
        // Serialization of this struct cannot fail; the fallback keeps the
        // handler infallible anyway
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"OK"}"#.to_string())
    }
}
