//! Realtime notification channel.
//!
//! One WebSocket connection per [`RealtimeService`], with typed event
//! dispatch and exponential-backoff reconnects.

mod backoff;
mod listeners;
mod service;
mod state;

pub use backoff::ReconnectPolicy;
pub use listeners::{Callback, ListenerId, ListenerRegistry};
pub use service::RealtimeService;
pub use state::ConnectionState;
