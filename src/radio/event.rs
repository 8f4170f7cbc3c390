//! Radio event taxonomy.
//!
//! Events are produced by the radio driver (or its adapter) and consumed
//! exactly once by the event dispatcher.

use std::fmt;
use std::net::Ipv4Addr;

/// Asynchronous notification from the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Station interface is up and ready to associate.
    StationStarted,
    /// Station associated and obtained an address.
    StationGotAddress(Ipv4Addr),
    /// Station lost (or failed to establish) its association.
    StationDisconnected(DisconnectReason),
    /// A client joined our access point.
    ApClientJoined(ClientId),
    /// A client left our access point.
    ApClientLeft(ClientId),
    /// Firmware event the adapter has no mapping for.
    Unrecognized(i32),
}

impl RadioEvent {
    /// Short name for log output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StationStarted => "station-started",
            Self::StationGotAddress(_) => "station-got-address",
            Self::StationDisconnected(_) => "station-disconnected",
            Self::ApClientJoined(_) => "ap-client-joined",
            Self::ApClientLeft(_) => "ap-client-left",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Why the station lost its association.
///
/// Codes follow the ESP-IDF `wifi_err_reason_t` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// AP beacons stopped arriving.
    BeaconTimeout,
    /// Configured SSID was not found during scan.
    NoApFound,
    /// Authentication was rejected.
    AuthFailed,
    /// Association was rejected.
    AssocFailed,
    /// 4-way handshake did not complete.
    HandshakeTimeout,
    /// The AP requires a basic rate our protocol set does not include.
    BasicRateUnsupported,
    /// Any other reason code.
    Other(u16),
}

impl DisconnectReason {
    /// Map a raw driver reason code.
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => Self::BeaconTimeout,
            201 => Self::NoApFound,
            202 => Self::AuthFailed,
            203 => Self::AssocFailed,
            204 => Self::HandshakeTimeout,
            205 => Self::BasicRateUnsupported,
            other => Self::Other(other),
        }
    }

    /// Raw driver reason code.
    pub fn code(&self) -> u16 {
        match self {
            Self::BeaconTimeout => 200,
            Self::NoApFound => 201,
            Self::AuthFailed => 202,
            Self::AssocFailed => 203,
            Self::HandshakeTimeout => 204,
            Self::BasicRateUnsupported => 205,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeaconTimeout => write!(f, "beacon timeout"),
            Self::NoApFound => write!(f, "no AP found"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::AssocFailed => write!(f, "association failed"),
            Self::HandshakeTimeout => write!(f, "handshake timeout"),
            Self::BasicRateUnsupported => write!(f, "basic rate not supported"),
            Self::Other(code) => write!(f, "reason {}", code),
        }
    }
}

/// A client of our access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    /// Client MAC address.
    pub mac: [u8; 6],
    /// Association ID assigned by the AP.
    pub aid: u16,
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.mac;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} (aid {})",
            m[0], m[1], m[2], m[3], m[4], m[5], self.aid
        )
    }
}
