//! Station + access point connectivity.
//!
//! # Components
//!
//! - [`controller`] - the connectivity state machine
//! - [`dispatcher`] - serialized event delivery from the radio to the controller
//! - [`readiness`] - lock-free "station connected" flag

mod controller;
mod dispatcher;
mod readiness;

pub use controller::{ConnectivityController, ConnectivityState, ControllerError, LinkStats};
pub use dispatcher::{
    DispatchClosed, DispatchSummary, EventDispatcher, EventSender, CONNECT_RETRY_INTERVAL,
    EVENT_QUEUE_DEPTH,
};
pub use readiness::Readiness;
