//! Radio control interface.
//!
//! The connectivity controller drives the radio only through [`RadioControl`]
//! and learns about the outside world only through [`RadioEvent`]s.
//!
//! # Components
//!
//! - [`event`] - event taxonomy (host-testable)
//! - [`sim`] - recording radio with fault injection (host-testable)
//! - [`esp`] - ESP-IDF WiFi driver adapter (ESP32 only)

mod event;
mod sim;

#[cfg(feature = "esp32")]
mod esp;

pub use event::{ClientId, DisconnectReason, RadioEvent};
pub use sim::{RadioCall, SimRadio};

#[cfg(feature = "esp32")]
pub use esp::{subscribe_radio_events, EspRadio, RadioSubscriptions};

use crate::config::Credentials;
use std::fmt;

/// Which interfaces the radio runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Client only.
    Station,
    /// Access point only.
    AccessPoint,
    /// Client and access point at the same time.
    StationAndAccessPoint,
}

/// Set of 802.11 protocols the station may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolSet(u8);

impl ProtocolSet {
    /// 802.11b.
    pub const B: Self = Self(0x01);
    /// 802.11g.
    pub const G: Self = Self(0x02);
    /// 802.11n.
    pub const N: Self = Self(0x04);
    /// Broadest legacy-compatible set, used as the basic-rate fallback.
    pub const BGN: Self = Self(0x07);

    /// Raw bitmap (ESP-IDF `WIFI_PROTOCOL_11*` layout).
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Union of two sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every protocol in `other` is in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Display for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [(Self::B, "b"), (Self::G, "g"), (Self::N, "n")]
            .into_iter()
            .filter(|(p, _)| self.contains(*p))
            .map(|(_, name)| name)
            .collect();
        write!(f, "802.11{}", names.join("/"))
    }
}

/// Radio control calls, used to label faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOperation {
    SetMode,
    SetStationConfig,
    SetApConfig,
    Start,
    Connect,
    SetCompatibilityProtocols,
}

impl fmt::Display for RadioOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetMode => "set mode",
            Self::SetStationConfig => "set station config",
            Self::SetApConfig => "set AP config",
            Self::Start => "start",
            Self::Connect => "connect",
            Self::SetCompatibilityProtocols => "set compatibility protocols",
        };
        write!(f, "{}", name)
    }
}

/// A radio control call failed.
///
/// Whether the fault is transient is the radio's call; the controller only
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioFault {
    /// The call that failed.
    pub operation: RadioOperation,
    /// Driver error code.
    pub code: i32,
}

impl RadioFault {
    /// Create a fault for the given operation.
    pub fn new(operation: RadioOperation, code: i32) -> Self {
        Self { operation, code }
    }
}

impl fmt::Display for RadioFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "radio {} failed (code {})", self.operation, self.code)
    }
}

impl std::error::Error for RadioFault {}

/// Control surface of a WiFi radio.
///
/// Calls configure or kick the radio; outcomes arrive later as
/// [`RadioEvent`]s through the event dispatcher.
pub trait RadioControl {
    /// Select which interfaces run.
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault>;

    /// Configure the upstream network to join.
    fn set_station_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault>;

    /// Configure the network to serve.
    ///
    /// Called while the station holds a live association, so it must leave
    /// the station interface and the radio mode untouched.
    fn set_ap_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault>;

    /// Start the configured interfaces.
    fn start(&mut self) -> Result<(), RadioFault>;

    /// Begin station association.
    fn connect(&mut self) -> Result<(), RadioFault>;

    /// Restrict the station to the given protocol set.
    fn set_compatibility_protocols(&mut self, protocols: ProtocolSet) -> Result<(), RadioFault>;
}
