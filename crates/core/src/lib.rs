pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod service;
pub mod telemetry;

pub use error::{EventBusError, HuddleError, Result};
pub use event::{
    BroadcastEventBus, Channel, Confirmation, Event, EventBus, EventPayload, EventSource,
    EventSubscription, wait_for,
};
pub use service::Worker;
