//! Connectivity state machine.
//!
//! The controller joins the upstream network as a station first and only
//! brings up the access point once the station holds an address. Running the
//! AP alone, or starting it before the station associates, leaves the radio
//! firmware unstable on this hardware class.
//!
//! # States
//!
//! ```text
//! Idle --initialize--> StationConnecting
//! StationConnecting --GotAddress--> StationConnected --AP started--> ApActive
//! StationConnecting --Disconnected--> StationConnecting (retry)
//! StationConnected / ApActive --Disconnected--> StationConnecting (retry)
//! ```
//!
//! There is no terminal state. Every disconnection is followed by another
//! `connect`; a `BasicRateUnsupported` disconnection first widens the station
//! protocol set to 802.11b/g/n. A `connect` the radio refuses leaves a retry
//! pending, which the next informational event or the dispatcher's retry
//! timer picks up.

use super::readiness::{ConnectedBit, Readiness};
use crate::config::{ConfigError, Credentials};
use crate::radio::{
    ClientId, DisconnectReason, ProtocolSet, RadioControl, RadioEvent, RadioFault, RadioMode,
};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

/// Protocol set applied when the upstream AP rejects our basic rates.
const FALLBACK_PROTOCOLS: ProtocolSet = ProtocolSet::BGN;

/// Connectivity state. Only the controller changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Not yet initialized.
    Idle,
    /// Waiting for the station to associate and get an address.
    StationConnecting,
    /// Station has an address; access point not running.
    StationConnected,
    /// Station has an address and the access point is serving.
    ApActive,
}

impl ConnectivityState {
    /// Whether the station holds an address in this state.
    pub fn is_station_connected(&self) -> bool {
        matches!(self, Self::StationConnected | Self::ApActive)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::StationConnecting => "station-connecting",
            Self::StationConnected => "station-connected",
            Self::ApActive => "ap-active",
        };
        write!(f, "{}", name)
    }
}

/// Counters kept by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// `connect` calls issued, failed ones included.
    pub connect_attempts: u32,
    /// Disconnections after the station had an address.
    pub link_losses: u32,
    /// Disconnections while still associating.
    pub association_failures: u32,
    /// Times the compatibility protocol set was applied.
    pub compatibility_fallbacks: u32,
    /// Successful access point starts.
    pub ap_starts: u32,
    /// Clients that joined the access point.
    pub ap_client_joins: u32,
    /// Clients that left the access point.
    pub ap_client_leaves: u32,
    /// Events that had no effect in the state they arrived in.
    pub ignored_events: u32,
}

/// Errors returned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Credentials failed validation. No radio call was made.
    Config(ConfigError),
    /// A radio control call failed.
    Radio(RadioFault),
    /// `initialize` was called on a running controller.
    AlreadyInitialized,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Radio(e) => write!(f, "{}", e),
            Self::AlreadyInitialized => write!(f, "controller already initialized"),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Radio(e) => Some(e),
            Self::AlreadyInitialized => None,
        }
    }
}

impl From<ConfigError> for ControllerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RadioFault> for ControllerError {
    fn from(e: RadioFault) -> Self {
        Self::Radio(e)
    }
}

/// Owns the connectivity state and drives the radio.
///
/// `handle_event` must only be called from one context at a time; the
/// [`EventDispatcher`](super::EventDispatcher) guarantees that.
pub struct ConnectivityController<'a, R: RadioControl> {
    radio: R,
    state: ConnectivityState,
    connected: ConnectedBit,
    /// Saved by `initialize`, applied after the first association.
    ap_credentials: Option<Credentials<'a>>,
    ap_started: bool,
    /// A `connect` was issued and no association outcome has arrived yet.
    connect_outstanding: bool,
    protocols: Option<ProtocolSet>,
    station_address: Option<Ipv4Addr>,
    ap_clients: HashSet<[u8; 6]>,
    stats: LinkStats,
}

impl<'a, R: RadioControl> ConnectivityController<'a, R> {
    /// Create an idle controller around `radio`.
    pub fn new(radio: R) -> Self {
        Self {
            radio,
            state: ConnectivityState::Idle,
            connected: ConnectedBit::new(),
            ap_credentials: None,
            ap_started: false,
            connect_outstanding: false,
            protocols: None,
            station_address: None,
            ap_clients: HashSet::new(),
            stats: LinkStats::default(),
        }
    }

    /// Configure the radio for station + AP operation and begin associating.
    ///
    /// Both credential pairs are validated before any radio call. On a radio
    /// fault the controller returns to `Idle` and may be initialized again.
    pub fn initialize(
        &mut self,
        station: Credentials<'a>,
        ap: Credentials<'a>,
    ) -> Result<(), ControllerError> {
        if self.state != ConnectivityState::Idle {
            return Err(ControllerError::AlreadyInitialized);
        }
        station.validate()?;
        ap.validate()?;

        info!("Joining '{}' as station", station.ssid_lossy());
        if let Err(e) = self.bring_up_station(&station, ap) {
            warn!("Station bring-up failed: {}", e);
            self.state = ConnectivityState::Idle;
            self.ap_credentials = None;
            self.connect_outstanding = false;
            return Err(e.into());
        }
        Ok(())
    }

    fn bring_up_station(
        &mut self,
        station: &Credentials<'a>,
        ap: Credentials<'a>,
    ) -> Result<(), RadioFault> {
        self.radio.set_mode(RadioMode::StationAndAccessPoint)?;
        self.radio.set_station_config(station)?;
        self.ap_credentials = Some(ap);
        self.state = ConnectivityState::StationConnecting;
        self.radio.start()?;
        self.request_connect()
    }

    /// Apply one radio event.
    ///
    /// Link loss is handled here and never reported as an error. Errors are
    /// radio faults raised while retrying or while starting the access point.
    pub fn handle_event(&mut self, event: RadioEvent) -> Result<(), ControllerError> {
        match event {
            RadioEvent::StationStarted => self.on_station_started()?,
            RadioEvent::StationGotAddress(addr) => self.on_got_address(addr)?,
            RadioEvent::StationDisconnected(reason) => self.on_disconnected(reason)?,
            RadioEvent::ApClientJoined(client) => {
                self.on_client_joined(client);
                self.retry_pending_connect()?;
            }
            RadioEvent::ApClientLeft(client) => {
                self.on_client_left(client);
                self.retry_pending_connect()?;
            }
            RadioEvent::Unrecognized(id) => {
                debug!("Ignoring unrecognized radio event {}", id);
                self.stats.ignored_events += 1;
                self.retry_pending_connect()?;
            }
        }
        Ok(())
    }

    /// Whether the station is associating with no `connect` in flight.
    ///
    /// Only true after the radio refused a `connect`. The radio reports no
    /// outcome for a refused call, so no event will arrive to resume.
    pub fn retry_pending(&self) -> bool {
        self.state == ConnectivityState::StationConnecting && !self.connect_outstanding
    }

    /// Issue the `connect` a refused call left pending. No-op otherwise.
    pub fn retry_pending_connect(&mut self) -> Result<(), ControllerError> {
        if !self.retry_pending() {
            return Ok(());
        }
        info!("Retrying refused station connect");
        self.request_connect()?;
        Ok(())
    }

    fn on_station_started(&mut self) -> Result<(), RadioFault> {
        if self.state == ConnectivityState::StationConnecting && !self.connect_outstanding {
            info!("Station started, connecting");
            return self.request_connect();
        }
        debug!("Station started in state {}, nothing to do", self.state);
        self.stats.ignored_events += 1;
        Ok(())
    }

    fn on_got_address(&mut self, addr: Ipv4Addr) -> Result<(), RadioFault> {
        match self.state {
            ConnectivityState::Idle => {
                warn!("Got address {} before initialization, ignoring", addr);
                self.stats.ignored_events += 1;
                Ok(())
            }
            ConnectivityState::StationConnecting => {
                info!("Station got address {}", addr);
                self.connect_outstanding = false;
                self.station_address = Some(addr);
                self.state = ConnectivityState::StationConnected;
                self.connected.set();

                if self.ap_started {
                    // AP kept running across the station outage
                    self.state = ConnectivityState::ApActive;
                    Ok(())
                } else {
                    self.start_access_point()
                }
            }
            ConnectivityState::StationConnected | ConnectivityState::ApActive => {
                if self.station_address != Some(addr) {
                    info!("Station address changed to {}", addr);
                    self.station_address = Some(addr);
                } else {
                    self.stats.ignored_events += 1;
                }
                Ok(())
            }
        }
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) -> Result<(), RadioFault> {
        if self.state == ConnectivityState::Idle {
            debug!("Disconnected ({}) before initialization, ignoring", reason);
            self.stats.ignored_events += 1;
            return Ok(());
        }

        if self.state.is_station_connected() {
            warn!("Station link lost: {}", reason);
            self.stats.link_losses += 1;
        } else {
            warn!("Station association failed: {}", reason);
            self.stats.association_failures += 1;
        }

        self.connected.clear();
        self.connect_outstanding = false;
        self.station_address = None;
        self.state = ConnectivityState::StationConnecting;

        if reason == DisconnectReason::BasicRateUnsupported {
            self.apply_compatibility_fallback();
        }
        self.request_connect()
    }

    fn apply_compatibility_fallback(&mut self) {
        info!("Switching station to {}", FALLBACK_PROTOCOLS);
        match self.radio.set_compatibility_protocols(FALLBACK_PROTOCOLS) {
            Ok(()) => {
                self.protocols = Some(FALLBACK_PROTOCOLS);
                self.stats.compatibility_fallbacks += 1;
            }
            // Retrying with the old protocol set still beats not retrying
            Err(e) => warn!("Compatibility fallback failed: {}", e),
        }
    }

    fn on_client_joined(&mut self, client: ClientId) {
        info!("AP client joined: {}", client);
        self.ap_clients.insert(client.mac);
        self.stats.ap_client_joins += 1;
    }

    fn on_client_left(&mut self, client: ClientId) {
        info!("AP client left: {}", client);
        self.ap_clients.remove(&client.mac);
        self.stats.ap_client_leaves += 1;
    }

    fn request_connect(&mut self) -> Result<(), RadioFault> {
        self.stats.connect_attempts += 1;
        self.connect_outstanding = true;
        if let Err(e) = self.radio.connect() {
            self.connect_outstanding = false;
            return Err(e);
        }
        Ok(())
    }

    /// Apply the AP configuration and start serving.
    ///
    /// Only reachable from the first successful association, so the AP can
    /// never come up ahead of the station.
    fn start_access_point(&mut self) -> Result<(), RadioFault> {
        debug_assert_eq!(self.state, ConnectivityState::StationConnected);
        let Some(ap) = self.ap_credentials else {
            return Ok(());
        };

        self.radio.set_ap_config(&ap)?;
        self.radio.start()?;

        self.ap_started = true;
        self.stats.ap_starts += 1;
        self.state = ConnectivityState::ApActive;
        info!(
            "Access point '{}' started ({})",
            ap.ssid_lossy(),
            if ap.is_open() { "open" } else { "WPA/WPA2-PSK" }
        );
        Ok(())
    }

    /// Lock-free read of the readiness flag.
    pub fn is_station_connected(&self) -> bool {
        self.connected.get()
    }

    /// A handle other components can poll for readiness.
    pub fn readiness(&self) -> Readiness {
        self.connected.readiness()
    }

    /// Current state.
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Counters since creation.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Station address while connected.
    pub fn station_address(&self) -> Option<Ipv4Addr> {
        self.station_address
    }

    /// Number of clients currently on the access point.
    pub fn ap_client_count(&self) -> usize {
        self.ap_clients.len()
    }

    /// Protocol set applied by the compatibility fallback, if any.
    pub fn protocols(&self) -> Option<ProtocolSet> {
        self.protocols
    }

    /// The radio being driven.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable access to the radio.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialField, Credentials};
    use crate::radio::{RadioCall, RadioOperation, SimRadio};

    const STA: Credentials<'static> = Credentials::new(b"Upstream", b"upstream-pass");
    const AP: Credentials<'static> = Credentials::new(b"gra77h0pper", b"experimental001");

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, last)
    }

    fn client(n: u8) -> ClientId {
        ClientId {
            mac: [0x02, 0, 0, 0, 0, n],
            aid: n as u16,
        }
    }

    fn initialized() -> ConnectivityController<'static, SimRadio> {
        let mut controller = ConnectivityController::new(SimRadio::new());
        controller.initialize(STA, AP).unwrap();
        controller
    }

    fn connected() -> ConnectivityController<'static, SimRadio> {
        let mut controller = initialized();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        controller
    }

    fn ap_starts(controller: &ConnectivityController<'_, SimRadio>) -> usize {
        controller.radio().count(RadioOperation::SetApConfig)
    }

    // ==================== initialize ====================

    #[test]
    fn test_initialize_enters_station_connecting() {
        let controller = initialized();
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
        assert!(!controller.is_station_connected());
        assert_eq!(controller.radio().connect_count(), 1);
    }

    #[test]
    fn test_initialize_call_order() {
        let controller = initialized();
        assert_eq!(
            controller.radio().calls(),
            &[
                RadioCall::SetMode(RadioMode::StationAndAccessPoint),
                RadioCall::SetStationConfig {
                    ssid: b"Upstream".to_vec()
                },
                RadioCall::Start,
                RadioCall::Connect,
            ]
        );
    }

    #[test]
    fn test_initialize_rejects_long_secret_without_radio_calls() {
        let secret = [b'x'; 70];
        let mut controller = ConnectivityController::new(SimRadio::new());

        let result = controller.initialize(STA, Credentials::new(b"gra77h0pper", &secret));

        assert_eq!(
            result,
            Err(ControllerError::Config(ConfigError::CredentialTooLong {
                field: CredentialField::Passphrase,
                len: 70,
                max: 64,
            }))
        );
        assert!(controller.radio().calls().is_empty());
        assert_eq!(controller.state(), ConnectivityState::Idle);
    }

    #[test]
    fn test_initialize_rejects_long_station_ssid() {
        let ssid = [b's'; 33];
        let mut controller = ConnectivityController::new(SimRadio::new());

        let result = controller.initialize(Credentials::new(&ssid, b"upstream-pass"), AP);

        assert!(matches!(
            result,
            Err(ControllerError::Config(ConfigError::CredentialTooLong {
                field: CredentialField::Ssid,
                ..
            }))
        ));
        assert!(controller.radio().calls().is_empty());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut controller = initialized();
        assert_eq!(
            controller.initialize(STA, AP),
            Err(ControllerError::AlreadyInitialized)
        );
        assert_eq!(controller.radio().connect_count(), 1);
    }

    #[test]
    fn test_initialize_radio_fault_returns_to_idle() {
        let mut radio = SimRadio::new();
        radio.fail_next(RadioOperation::Start);
        let mut controller = ConnectivityController::new(radio);

        let result = controller.initialize(STA, AP);
        assert!(matches!(
            result,
            Err(ControllerError::Radio(RadioFault {
                operation: RadioOperation::Start,
                ..
            }))
        ));
        assert_eq!(controller.state(), ConnectivityState::Idle);
        assert_eq!(controller.radio().connect_count(), 0);

        // A later attempt can succeed
        controller.initialize(STA, AP).unwrap();
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
    }

    // ==================== association ====================

    #[test]
    fn test_got_address_sets_bit_and_starts_ap_once() {
        let mut controller = initialized();
        let readiness = controller.readiness();

        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        assert!(controller.is_station_connected());
        assert!(readiness.is_station_connected());
        assert_eq!(controller.state(), ConnectivityState::ApActive);
        assert_eq!(controller.station_address(), Some(addr(10)));
        assert_eq!(ap_starts(&controller), 1);

        // Same event while already connected starts nothing
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        assert_eq!(ap_starts(&controller), 1);
        assert_eq!(controller.stats().ap_starts, 1);
    }

    #[test]
    fn test_ap_starts_after_station_association() {
        let controller = connected();
        let calls = controller.radio().calls();
        let connect_idx = calls.iter().position(|c| *c == RadioCall::Connect).unwrap();
        let ap_idx = calls
            .iter()
            .position(|c| matches!(c, RadioCall::SetApConfig { .. }))
            .unwrap();
        assert!(connect_idx < ap_idx);
        assert_eq!(calls.last(), Some(&RadioCall::Start));
    }

    #[test]
    fn test_ap_start_leaves_station_interface_alone() {
        let mut controller = initialized();
        controller.radio_mut().clear();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        assert_eq!(
            controller.radio().calls(),
            &[
                RadioCall::SetApConfig {
                    ssid: b"gra77h0pper".to_vec(),
                    open: false,
                },
                RadioCall::Start,
            ]
        );
    }

    #[test]
    fn test_address_change_is_tracked() {
        let mut controller = connected();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(42)))
            .unwrap();
        assert_eq!(controller.station_address(), Some(addr(42)));
        assert_eq!(ap_starts(&controller), 1);
    }

    #[test]
    fn test_station_started_does_not_duplicate_connect() {
        let mut controller = initialized();
        controller.handle_event(RadioEvent::StationStarted).unwrap();
        assert_eq!(controller.radio().connect_count(), 1);
    }

    #[test]
    fn test_station_started_connects_when_none_outstanding() {
        // A failed retry leaves no connect outstanding; the radio restart
        // that follows must kick off association again.
        let mut controller = initialized();
        controller.radio_mut().fail_next(RadioOperation::Connect);
        let result =
            controller.handle_event(RadioEvent::StationDisconnected(DisconnectReason::NoApFound));
        assert!(result.is_err());
        let before = controller.radio().connect_count();

        controller.handle_event(RadioEvent::StationStarted).unwrap();
        assert_eq!(controller.radio().connect_count(), before + 1);
    }

    // ==================== disconnection ====================

    #[test]
    fn test_disconnect_while_connecting_retries() {
        let mut controller = initialized();
        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::NoApFound))
            .unwrap();
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
        assert_eq!(controller.radio().connect_count(), 2);
        assert_eq!(controller.stats().association_failures, 1);
        assert_eq!(ap_starts(&controller), 0);
    }

    #[test]
    fn test_disconnect_while_connected_clears_bit_and_retries() {
        let mut controller = connected();
        let readiness = controller.readiness();

        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::BeaconTimeout))
            .unwrap();
        assert!(!controller.is_station_connected());
        assert!(!readiness.is_station_connected());
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
        assert_eq!(controller.station_address(), None);
        assert_eq!(controller.radio().connect_count(), 2);
        assert_eq!(controller.stats().link_losses, 1);
    }

    #[test]
    fn test_basic_rate_unsupported_applies_fallback_before_connect() {
        let mut controller = connected();
        controller.radio_mut().clear();

        controller
            .handle_event(RadioEvent::StationDisconnected(
                DisconnectReason::BasicRateUnsupported,
            ))
            .unwrap();

        assert_eq!(
            controller.radio().calls(),
            &[
                RadioCall::SetCompatibilityProtocols(ProtocolSet::BGN),
                RadioCall::Connect,
            ]
        );
        assert!(!controller.is_station_connected());
        assert_eq!(controller.protocols(), Some(ProtocolSet::BGN));
        assert_eq!(controller.stats().compatibility_fallbacks, 1);
    }

    #[test]
    fn test_basic_rate_unsupported_while_connecting() {
        let mut controller = initialized();
        controller
            .handle_event(RadioEvent::StationDisconnected(
                DisconnectReason::BasicRateUnsupported,
            ))
            .unwrap();

        let calls = controller.radio().calls();
        let n = calls.len();
        assert_eq!(
            &calls[n - 2..],
            &[
                RadioCall::SetCompatibilityProtocols(ProtocolSet::BGN),
                RadioCall::Connect,
            ]
        );
    }

    #[test]
    fn test_other_reason_does_not_touch_protocols() {
        let mut controller = connected();
        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)))
            .unwrap();
        assert_eq!(
            controller
                .radio()
                .count(RadioOperation::SetCompatibilityProtocols),
            0
        );
        assert_eq!(controller.protocols(), None);
    }

    #[test]
    fn test_fallback_failure_still_retries() {
        let mut controller = initialized();
        controller
            .radio_mut()
            .fail_next(RadioOperation::SetCompatibilityProtocols);

        controller
            .handle_event(RadioEvent::StationDisconnected(
                DisconnectReason::BasicRateUnsupported,
            ))
            .unwrap();
        assert_eq!(controller.radio().connect_count(), 2);
        assert_eq!(controller.protocols(), None);
    }

    #[test]
    fn test_reconnect_sequence() {
        let mut controller = initialized();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)))
            .unwrap();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(11)))
            .unwrap();

        assert!(controller.is_station_connected());
        assert_eq!(controller.radio().connect_count(), 2);
        assert_eq!(ap_starts(&controller), 1);
        assert_eq!(controller.state(), ConnectivityState::ApActive);
    }

    #[test]
    fn test_ap_start_fault_is_reported_and_retried_on_next_association() {
        let mut controller = initialized();
        controller.radio_mut().fail_next(RadioOperation::SetApConfig);

        let result = controller.handle_event(RadioEvent::StationGotAddress(addr(10)));
        assert!(matches!(result, Err(ControllerError::Radio(_))));
        assert!(controller.is_station_connected());
        assert_eq!(controller.state(), ConnectivityState::StationConnected);

        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)))
            .unwrap();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        assert_eq!(controller.state(), ConnectivityState::ApActive);
        assert_eq!(controller.stats().ap_starts, 1);
    }

    #[test]
    fn test_retry_connect_fault_is_reported() {
        let mut controller = connected();
        controller.radio_mut().fail_next(RadioOperation::Connect);

        let result =
            controller.handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)));
        assert!(matches!(
            result,
            Err(ControllerError::Radio(RadioFault {
                operation: RadioOperation::Connect,
                ..
            }))
        ));
        assert!(!controller.is_station_connected());
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
        assert!(controller.retry_pending());
    }

    #[test]
    fn test_refused_retry_resumes_on_later_events() {
        let mut controller = connected();
        controller.radio_mut().fail_next(RadioOperation::Connect);
        assert!(controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::BeaconTimeout))
            .is_err());
        assert_eq!(controller.radio().connect_count(), 2);

        controller
            .handle_event(RadioEvent::ApClientJoined(client(1)))
            .unwrap();
        assert_eq!(controller.radio().connect_count(), 3);
        assert!(!controller.retry_pending());

        // Connect is in flight again; further events add nothing
        for _ in 0..5 {
            controller.handle_event(RadioEvent::Unrecognized(99)).unwrap();
        }
        assert_eq!(controller.radio().connect_count(), 3);

        controller
            .handle_event(RadioEvent::StationGotAddress(addr(12)))
            .unwrap();
        assert!(controller.is_station_connected());
    }

    #[test]
    fn test_refused_retry_keeps_retrying() {
        let mut controller = connected();
        controller.radio_mut().fail_next(RadioOperation::Connect);
        assert!(controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)))
            .is_err());

        controller.radio_mut().fail_next(RadioOperation::Connect);
        assert!(controller
            .handle_event(RadioEvent::Unrecognized(99))
            .is_err());
        assert!(controller.retry_pending());

        controller.retry_pending_connect().unwrap();
        assert_eq!(controller.radio().connect_count(), 4);
        assert!(!controller.retry_pending());

        // Nothing pending: no extra connect
        controller.retry_pending_connect().unwrap();
        assert_eq!(controller.radio().connect_count(), 4);
    }

    #[test]
    fn test_no_retry_pending_while_connect_in_flight_or_connected() {
        let mut controller = ConnectivityController::new(SimRadio::new());
        assert!(!controller.retry_pending());
        controller.initialize(STA, AP).unwrap();
        assert!(!controller.retry_pending());
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        assert!(!controller.retry_pending());
    }

    #[test]
    fn test_repeated_address_while_station_connected_does_not_start_ap() {
        let mut controller = initialized();
        controller.radio_mut().fail_next(RadioOperation::SetApConfig);
        assert!(controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .is_err());
        assert_eq!(controller.state(), ConnectivityState::StationConnected);
        assert_eq!(ap_starts(&controller), 1);

        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(11)))
            .unwrap();
        assert_eq!(controller.state(), ConnectivityState::StationConnected);
        assert_eq!(ap_starts(&controller), 1);
        assert_eq!(controller.stats().ap_starts, 0);
        assert_eq!(controller.station_address(), Some(addr(11)));
    }

    // ==================== informational events ====================

    #[test]
    fn test_ap_client_events_do_not_change_state() {
        let mut controller = connected();
        let state = controller.state();

        for _ in 0..3 {
            controller
                .handle_event(RadioEvent::ApClientJoined(client(1)))
                .unwrap();
            controller
                .handle_event(RadioEvent::ApClientLeft(client(1)))
                .unwrap();
        }
        assert_eq!(controller.state(), state);
        assert!(controller.is_station_connected());
        assert_eq!(controller.ap_client_count(), 0);
        assert_eq!(controller.stats().ap_client_joins, 3);
        assert_eq!(controller.stats().ap_client_leaves, 3);
    }

    #[test]
    fn test_ap_client_events_while_connecting() {
        let mut controller = initialized();
        controller
            .handle_event(RadioEvent::ApClientJoined(client(1)))
            .unwrap();
        controller
            .handle_event(RadioEvent::ApClientJoined(client(2)))
            .unwrap();
        assert_eq!(controller.state(), ConnectivityState::StationConnecting);
        assert!(!controller.is_station_connected());
        assert_eq!(controller.ap_client_count(), 2);
    }

    #[test]
    fn test_unrecognized_event_is_ignored() {
        let mut controller = connected();
        let calls_before = controller.radio().calls().len();

        controller.handle_event(RadioEvent::Unrecognized(99)).unwrap();
        assert_eq!(controller.state(), ConnectivityState::ApActive);
        assert_eq!(controller.radio().calls().len(), calls_before);
        assert_eq!(controller.stats().ignored_events, 1);
    }

    #[test]
    fn test_events_before_initialize_are_ignored() {
        let mut controller = ConnectivityController::new(SimRadio::new());
        controller
            .handle_event(RadioEvent::StationGotAddress(addr(10)))
            .unwrap();
        controller
            .handle_event(RadioEvent::StationDisconnected(DisconnectReason::Other(8)))
            .unwrap();
        controller.handle_event(RadioEvent::StationStarted).unwrap();

        assert_eq!(controller.state(), ConnectivityState::Idle);
        assert!(!controller.is_station_connected());
        assert!(controller.radio().calls().is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = ControllerError::Radio(RadioFault::new(RadioOperation::SetApConfig, -1));
        assert_eq!(err.to_string(), "radio set AP config failed (code -1)");
        assert_eq!(
            ControllerError::AlreadyInitialized.to_string(),
            "controller already initialized"
        );
    }
}
