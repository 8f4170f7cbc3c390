//! Recording radio for host builds.
//!
//! [`SimRadio`] implements [`RadioControl`] without hardware. It records every
//! call it receives, can be told to fail the next call of a given kind, and can
//! forward calls to an observer task that plays the part of the air interface
//! (see the `host-link` binary).

use super::{ProtocolSet, RadioControl, RadioFault, RadioMode, RadioOperation};
use crate::config::Credentials;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

/// Error code reported for injected faults (ESP-IDF `ESP_FAIL`).
const SIM_FAULT_CODE: i32 = -1;

/// A call received by [`SimRadio`]. Passphrases are never recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    SetMode(RadioMode),
    SetStationConfig { ssid: Vec<u8> },
    SetApConfig { ssid: Vec<u8>, open: bool },
    Start,
    Connect,
    SetCompatibilityProtocols(ProtocolSet),
}

impl RadioCall {
    fn operation(&self) -> RadioOperation {
        match self {
            Self::SetMode(_) => RadioOperation::SetMode,
            Self::SetStationConfig { .. } => RadioOperation::SetStationConfig,
            Self::SetApConfig { .. } => RadioOperation::SetApConfig,
            Self::Start => RadioOperation::Start,
            Self::Connect => RadioOperation::Connect,
            Self::SetCompatibilityProtocols(_) => RadioOperation::SetCompatibilityProtocols,
        }
    }
}

/// In-memory radio that records calls.
#[derive(Debug, Default)]
pub struct SimRadio {
    calls: Vec<RadioCall>,
    fail_next: Vec<RadioOperation>,
    observer: Option<UnboundedSender<RadioCall>>,
}

impl SimRadio {
    /// Create a radio with no observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a radio that forwards every successful call to `observer`.
    pub fn with_observer(observer: UnboundedSender<RadioCall>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    /// Make the next call of kind `operation` fail.
    pub fn fail_next(&mut self, operation: RadioOperation) {
        self.fail_next.push(operation);
    }

    /// Every call received so far, failed ones included, in order.
    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    /// Number of calls of kind `operation`.
    pub fn count(&self, operation: RadioOperation) -> usize {
        self.calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Number of `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.count(RadioOperation::Connect)
    }

    /// Forget recorded calls.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    fn record(&mut self, call: RadioCall) -> Result<(), RadioFault> {
        let operation = call.operation();
        debug!("sim radio: {:?}", call);
        self.calls.push(call.clone());

        if let Some(idx) = self.fail_next.iter().position(|op| *op == operation) {
            self.fail_next.remove(idx);
            return Err(RadioFault::new(operation, SIM_FAULT_CODE));
        }

        if let Some(observer) = &self.observer {
            // A closed observer only means nobody is simulating the air side
            let _ = observer.send(call);
        }
        Ok(())
    }
}

impl RadioControl for SimRadio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault> {
        self.record(RadioCall::SetMode(mode))
    }

    fn set_station_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault> {
        self.record(RadioCall::SetStationConfig {
            ssid: creds.ssid().to_vec(),
        })
    }

    fn set_ap_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault> {
        self.record(RadioCall::SetApConfig {
            ssid: creds.ssid().to_vec(),
            open: creds.is_open(),
        })
    }

    fn start(&mut self) -> Result<(), RadioFault> {
        self.record(RadioCall::Start)
    }

    fn connect(&mut self) -> Result<(), RadioFault> {
        self.record(RadioCall::Connect)
    }

    fn set_compatibility_protocols(&mut self, protocols: ProtocolSet) -> Result<(), RadioFault> {
        self.record(RadioCall::SetCompatibilityProtocols(protocols))
    }
}
