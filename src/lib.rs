//! Station + access point connectivity for ESP32-class devices.
//!
//! The device joins an upstream network as a station and, once it holds an
//! address, serves its own network as an access point. Both roles run
//! concurrently and the station reconnects on its own after every link loss.
//!
//! Everything except the ESP-IDF adapter and flash storage is
//! platform-independent and tested on the host against [`radio::SimRadio`].

pub mod boot_counter;
pub mod config;
pub mod link;
#[cfg(feature = "esp32")]
pub mod persistence;
pub mod radio;

// Re-export commonly used items
pub use config::{ConfigError, CredentialStore, Credentials, ProvisionedCredentials};
pub use link::{
    ConnectivityController, ConnectivityState, ControllerError, EventDispatcher, EventSender,
    Readiness,
};
pub use radio::{RadioControl, RadioEvent, RadioFault};
