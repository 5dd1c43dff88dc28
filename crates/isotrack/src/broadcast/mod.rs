//! Engine event streaming for front ends.

pub mod engine_events;

pub use engine_events::{EngineEvent, EventBroadcaster, EventEnvelope};
