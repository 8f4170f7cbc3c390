//! Serialized delivery of radio events to the controller.
//!
//! Radio events are raised on the driver's own context (on ESP32, the system
//! event loop task). [`EventSender`] moves them into a bounded queue;
//! [`EventDispatcher`] drains the queue on the controller's context and hands
//! events over one at a time, in arrival order.
//!
//! # Backpressure
//!
//! The queue never drops events. When it is full, [`EventSender::notify`]
//! blocks the calling thread and [`EventSender::send`] waits until the
//! dispatcher catches up. A lost disconnect would leave the controller
//! believing it is still connected.
//!
//! # Refused connects
//!
//! When the radio refuses a `connect`, no association outcome will ever be
//! reported. While the controller has such a retry pending, the dispatcher
//! waits at most [`CONNECT_RETRY_INTERVAL`] for the next event and otherwise
//! issues the retry itself.
//!
//! # Example
//!
//! ```
//! use apsta_link::config::Credentials;
//! use apsta_link::link::{ConnectivityController, EventDispatcher};
//! use apsta_link::radio::{RadioEvent, SimRadio};
//! use std::net::Ipv4Addr;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut controller = ConnectivityController::new(SimRadio::new());
//! controller
//!     .initialize(
//!         Credentials::new(b"Upstream", b"upstream-pass"),
//!         Credentials::new(b"DeviceAp", b"device-pass"),
//!     )
//!     .unwrap();
//!
//! let (sender, dispatcher) = EventDispatcher::new();
//! sender
//!     .send(RadioEvent::StationGotAddress(Ipv4Addr::new(10, 0, 0, 2)))
//!     .await
//!     .unwrap();
//! drop(sender);
//!
//! let summary = dispatcher.run(&mut controller).await;
//! assert_eq!(summary.delivered, 1);
//! assert!(controller.is_station_connected());
//! # });
//! ```

use super::controller::{ConnectivityController, ControllerError};
use crate::radio::{RadioControl, RadioEvent};
use log::{debug, error, info, warn};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Queue depth, matching the ESP-IDF default system event loop queue.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// How long a refused `connect` waits before the dispatcher retries it.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// What a finished dispatch loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Events handed to the controller.
    pub delivered: u64,
    /// Events whose handling returned an error, plus failed connect retries.
    pub faults: u64,
    /// Connect retries issued by the dispatcher's timer.
    pub connect_retries: u64,
}

/// The dispatcher is gone; the event was not queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchClosed(pub RadioEvent);

impl fmt::Display for DispatchClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event dispatcher closed, {} not delivered", self.0.name())
    }
}

impl std::error::Error for DispatchClosed {}

/// Producer half of the event queue. Clone one per notification source.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<RadioEvent>,
}

impl EventSender {
    /// Queue an event from a plain thread, blocking while the queue is full.
    ///
    /// This is the entry point for driver callbacks. It must not be called
    /// from inside an async task; use [`EventSender::send`] there.
    pub fn notify(&self, event: RadioEvent) -> Result<(), DispatchClosed> {
        self.tx
            .blocking_send(event)
            .map_err(|mpsc::error::SendError(event)| DispatchClosed(event))
    }

    /// Queue an event from an async task, waiting while the queue is full.
    pub async fn send(&self, event: RadioEvent) -> Result<(), DispatchClosed> {
        self.tx
            .send(event)
            .await
            .map_err(|mpsc::error::SendError(event)| DispatchClosed(event))
    }
}

/// Consumer half of the event queue.
#[derive(Debug)]
pub struct EventDispatcher {
    rx: mpsc::Receiver<RadioEvent>,
    summary: DispatchSummary,
    retry_interval: Duration,
}

impl EventDispatcher {
    /// Create a queue of [`EVENT_QUEUE_DEPTH`] events.
    pub fn new() -> (EventSender, Self) {
        Self::with_capacity(EVENT_QUEUE_DEPTH)
    }

    /// Create a queue holding at most `capacity` undelivered events.
    ///
    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            EventSender { tx },
            Self {
                rx,
                summary: DispatchSummary::default(),
                retry_interval: CONNECT_RETRY_INTERVAL,
            },
        )
    }

    /// Replace [`CONNECT_RETRY_INTERVAL`].
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Deliver the next event, waiting for one if the queue is empty.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained. Handler errors are logged, counted and returned; they do not
    /// close the queue.
    pub async fn dispatch_next<R: RadioControl>(
        &mut self,
        controller: &mut ConnectivityController<'_, R>,
    ) -> Option<Result<(), ControllerError>> {
        let event = loop {
            if !controller.retry_pending() {
                break self.rx.recv().await?;
            }
            match tokio::time::timeout(self.retry_interval, self.rx.recv()).await {
                Ok(event) => break event?,
                Err(_) => self.retry_connect(controller),
            }
        };
        debug!("Dispatching {:?} in state {}", event, controller.state());

        let name = event.name();
        let result = controller.handle_event(event);
        self.summary.delivered += 1;
        if let Err(e) = &result {
            self.summary.faults += 1;
            error!("Handling {} failed: {}", name, e);
        }
        Some(result)
    }

    fn retry_connect<R: RadioControl>(&mut self, controller: &mut ConnectivityController<'_, R>) {
        self.summary.connect_retries += 1;
        if let Err(e) = controller.retry_pending_connect() {
            self.summary.faults += 1;
            warn!("Connect retry failed: {}", e);
        }
    }

    /// Deliver events until every sender is dropped.
    pub async fn run<R: RadioControl>(
        mut self,
        controller: &mut ConnectivityController<'_, R>,
    ) -> DispatchSummary {
        info!("Event dispatcher running");
        while self.dispatch_next(controller).await.is_some() {}
        info!(
            "Event dispatcher stopped after {} events ({} faults)",
            self.summary.delivered, self.summary.faults
        );
        self.summary
    }

    /// Counters so far.
    pub fn summary(&self) -> DispatchSummary {
        self.summary
    }
}
