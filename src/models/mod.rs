//! Wire models for the realtime channel.
//!
//! Payload records mirror what the AgriConnect API pushes. Fields other than
//! identifiers are optional so partially populated payloads still decode.

mod comment;
mod consultation;
mod envelope;
mod event;
mod follow;
mod notification;
mod payment;

pub use comment::*;
pub use consultation::*;
pub use envelope::*;
pub use event::*;
pub use follow::*;
pub use notification::*;
pub use payment::*;

use serde::de::DeserializeOwned;

/// A payload type bound to the event it arrives with.
pub trait EventPayload: DeserializeOwned + Send + 'static {
    const KIND: EventKind;
}
