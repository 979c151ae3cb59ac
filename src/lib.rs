//! AgriConnect realtime channel
//!
//! Client for the AgriConnect server-push WebSocket: token authentication,
//! typed event dispatch and exponential-backoff reconnects.

pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod realtime;

pub use config::Config;
pub use errors::{RealtimeError, Result};
pub use models::{EventKind, EventPayload};
pub use realtime::{ConnectionState, ListenerId, RealtimeService, ReconnectPolicy};
