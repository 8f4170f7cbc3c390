//! ESP-IDF WiFi adapter.
//!
//! [`EspRadio`] drives `EspWifi` through [`RadioControl`]. Each configuration
//! call touches only its own interface: the AP is configured while the station
//! holds a live association, and re-applying the station half at that point
//! would bounce the link.
//!
//! [`subscribe_radio_events`] turns system event loop notifications into
//! [`RadioEvent`]s. The callbacks run on the event loop task and block it when
//! the dispatcher queue is full.

use super::{
    ClientId, DisconnectReason, ProtocolSet, RadioControl, RadioEvent, RadioFault, RadioMode,
    RadioOperation,
};
use crate::config::{Credentials, AP_MAX_CONNECTIONS};
use crate::link::EventSender;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{EspWifi, WifiEvent};
use esp_idf_sys::{
    esp, wifi_ap_config_t, wifi_auth_mode_t, wifi_config_t, wifi_interface_t, wifi_mode_t,
    wifi_sta_config_t, EspError,
};
use log::{debug, warn};

/// ESP-IDF WiFi driver behind [`RadioControl`].
pub struct EspRadio<'d> {
    wifi: EspWifi<'d>,
}

impl<'d> EspRadio<'d> {
    /// Create the driver.
    ///
    /// `nvs` lets the driver keep RF calibration data across boots.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self { wifi })
    }
}

fn fault(operation: RadioOperation, e: EspError) -> RadioFault {
    RadioFault::new(operation, e.code())
}

fn invalid_arg(operation: RadioOperation) -> RadioFault {
    RadioFault::new(operation, esp_idf_sys::ESP_ERR_INVALID_ARG as i32)
}

/// Copy `src` into a fixed driver field, zero-padded.
fn fill<const N: usize>(src: &[u8], operation: RadioOperation) -> Result<[u8; N], RadioFault> {
    let mut field = [0u8; N];
    field
        .get_mut(..src.len())
        .ok_or_else(|| invalid_arg(operation))?
        .copy_from_slice(src);
    Ok(field)
}

fn auth_mode(creds: &Credentials<'_>, secured: wifi_auth_mode_t) -> wifi_auth_mode_t {
    if creds.is_open() {
        esp_idf_sys::wifi_auth_mode_t_WIFI_AUTH_OPEN
    } else {
        secured
    }
}

fn mode_bits(mode: RadioMode) -> wifi_mode_t {
    match mode {
        RadioMode::Station => esp_idf_sys::wifi_mode_t_WIFI_MODE_STA,
        RadioMode::AccessPoint => esp_idf_sys::wifi_mode_t_WIFI_MODE_AP,
        RadioMode::StationAndAccessPoint => esp_idf_sys::wifi_mode_t_WIFI_MODE_APSTA,
    }
}

/// Apply `config` to one interface only.
fn set_interface_config(
    interface: wifi_interface_t,
    mut config: wifi_config_t,
    operation: RadioOperation,
) -> Result<(), RadioFault> {
    // SAFETY: `config` lives on this frame for the whole call; the driver
    // copies it.
    esp!(unsafe { esp_idf_sys::esp_wifi_set_config(interface, &mut config) })
        .map_err(|e| fault(operation, e))
}

impl RadioControl for EspRadio<'_> {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault> {
        // SAFETY: plain FFI call on an initialized driver; no pointers involved.
        esp!(unsafe { esp_idf_sys::esp_wifi_set_mode(mode_bits(mode)) })
            .map_err(|e| fault(RadioOperation::SetMode, e))
    }

    fn set_station_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault> {
        let op = RadioOperation::SetStationConfig;
        let mut sta = wifi_sta_config_t {
            ssid: fill(creds.ssid(), op)?,
            password: fill(creds.passphrase(), op)?,
            ..Default::default()
        };
        sta.threshold.authmode =
            auth_mode(creds, esp_idf_sys::wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK);
        set_interface_config(
            esp_idf_sys::wifi_interface_t_WIFI_IF_STA,
            wifi_config_t { sta },
            op,
        )
    }

    fn set_ap_config(&mut self, creds: &Credentials<'_>) -> Result<(), RadioFault> {
        let op = RadioOperation::SetApConfig;
        let ap = wifi_ap_config_t {
            ssid: fill(creds.ssid(), op)?,
            ssid_len: creds.ssid().len() as u8,
            password: fill(creds.passphrase(), op)?,
            max_connection: AP_MAX_CONNECTIONS,
            authmode: auth_mode(creds, esp_idf_sys::wifi_auth_mode_t_WIFI_AUTH_WPA_WPA2_PSK),
            ..Default::default()
        };
        set_interface_config(
            esp_idf_sys::wifi_interface_t_WIFI_IF_AP,
            wifi_config_t { ap },
            op,
        )
    }

    fn start(&mut self) -> Result<(), RadioFault> {
        self.wifi.start().map_err(|e| fault(RadioOperation::Start, e))
    }

    fn connect(&mut self) -> Result<(), RadioFault> {
        self.wifi
            .connect()
            .map_err(|e| fault(RadioOperation::Connect, e))
    }

    fn set_compatibility_protocols(&mut self, protocols: ProtocolSet) -> Result<(), RadioFault> {
        // SAFETY: plain FFI call on an initialized driver; no pointers involved.
        esp!(unsafe {
            esp_idf_sys::esp_wifi_set_protocol(
                esp_idf_sys::wifi_interface_t_WIFI_IF_STA,
                protocols.bits(),
            )
        })
        .map_err(|e| fault(RadioOperation::SetCompatibilityProtocols, e))
    }
}

/// Keeps the event loop subscriptions alive. Dropping it stops event delivery.
pub struct RadioSubscriptions {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

/// Forward WiFi and IP events from the system event loop to `sender`.
pub fn subscribe_radio_events(
    sysloop: &EspSystemEventLoop,
    sender: EventSender,
) -> Result<RadioSubscriptions, EspError> {
    let wifi_sender = sender.clone();
    let wifi = sysloop.subscribe::<WifiEvent, _>(move |event| {
        if let Some(event) = map_wifi_event(&event) {
            forward(&wifi_sender, event);
        }
    })?;

    let ip = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(assignment) = event {
            forward(&sender, RadioEvent::StationGotAddress(assignment.ip()));
        }
    })?;

    Ok(RadioSubscriptions {
        _wifi: wifi,
        _ip: ip,
    })
}

fn map_wifi_event(event: &WifiEvent) -> Option<RadioEvent> {
    let mapped = match event {
        WifiEvent::StaStarted => RadioEvent::StationStarted,
        WifiEvent::StaDisconnected(info) => RadioEvent::StationDisconnected(
            DisconnectReason::from_code(info.reason() as u16),
        ),
        WifiEvent::ApStaConnected(info) => RadioEvent::ApClientJoined(ClientId {
            mac: info.mac(),
            aid: info.aid() as u16,
        }),
        WifiEvent::ApStaDisconnected(info) => RadioEvent::ApClientLeft(ClientId {
            mac: info.mac(),
            aid: info.aid() as u16,
        }),
        WifiEvent::StaConnected(_) => {
            RadioEvent::Unrecognized(esp_idf_sys::wifi_event_t_WIFI_EVENT_STA_CONNECTED as i32)
        }
        WifiEvent::StaStopped => {
            RadioEvent::Unrecognized(esp_idf_sys::wifi_event_t_WIFI_EVENT_STA_STOP as i32)
        }
        WifiEvent::ApStarted => {
            RadioEvent::Unrecognized(esp_idf_sys::wifi_event_t_WIFI_EVENT_AP_START as i32)
        }
        WifiEvent::ApStopped => {
            RadioEvent::Unrecognized(esp_idf_sys::wifi_event_t_WIFI_EVENT_AP_STOP as i32)
        }
        other => {
            debug!("Not forwarding WiFi event {:?}", other);
            return None;
        }
    };
    Some(mapped)
}

fn forward(sender: &EventSender, event: RadioEvent) {
    if let Err(e) = sender.notify(event) {
        warn!("{}", e);
    }
}
