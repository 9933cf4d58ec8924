//! Event envelope, in-process pub/sub bus, and SSE wire encoding
//! (spec component 4.H Event Bus).
//!
//! This crate is deliberately standalone: `core` and `serve` depend on it,
//! it depends on neither.

pub mod bus;
pub mod envelope;
pub mod event;

pub use bus::{EventBus, Subscriber, SubscriberId};
pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::{sse_encode, BusEvent};
