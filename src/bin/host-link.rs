//! Host-based station + AP link against a simulated radio.
//!
//! This binary runs on the host machine (not ESP32). A simulated air interface
//! answers the controller's radio calls with events, so the whole
//! connect / fall back / lose link / reconnect cycle can be watched in the log:
//!
//! - the first association is rejected for basic rates, forcing the 802.11b/g/n
//!   fallback
//! - the second association succeeds and the access point comes up
//! - clients join and leave the access point
//! - the upstream link drops periodically and the station reconnects
//!
//! # Usage
//!
//! ```bash
//! APSTA_STA_SSID=Upstream APSTA_STA_PASSWORD=upstream-pass cargo run --bin host-link
//! ```
//!
//! Unset variables fall back to demo credentials. Ctrl+C exits.

use apsta_link::boot_counter::BootCounter;
use apsta_link::config::{ConfigError, CredentialStore, ProvisionedCredentials};
use apsta_link::link::{ConnectivityController, EventDispatcher, EventSender, Readiness};
use apsta_link::radio::{ClientId, DisconnectReason, RadioCall, RadioEvent, SimRadio};
use log::{error, info, warn};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Simulated association latency.
const ASSOCIATION_DELAY: Duration = Duration::from_millis(500);

/// How often the simulated upstream AP drops us.
const LINK_DROP_INTERVAL: Duration = Duration::from_secs(20);

/// How often a simulated client joins or leaves our AP.
const CLIENT_CHURN_INTERVAL: Duration = Duration::from_secs(7);

/// How often readiness is reported.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn credentials_from_env() -> Result<ProvisionedCredentials, ConfigError> {
    let sta_ssid = env_or("APSTA_STA_SSID", "Upstream");
    let sta_password = env_or("APSTA_STA_PASSWORD", "upstream-pass");
    let ap_ssid = env_or("APSTA_AP_SSID", "apsta-link");
    let ap_password = env_or("APSTA_AP_PASSWORD", "apsta-link-ap");

    ProvisionedCredentials::new(
        sta_ssid.as_bytes(),
        sta_password.as_bytes(),
        ap_ssid.as_bytes(),
        ap_password.as_bytes(),
    )
}

/// Plays the upstream AP and our AP's clients.
struct SimulatedAir {
    events: EventSender,
    associated: bool,
    ap_running: bool,
    connect_attempts: u32,
    next_client: u8,
    clients: Vec<ClientId>,
}

impl SimulatedAir {
    fn new(events: EventSender) -> Self {
        Self {
            events,
            associated: false,
            ap_running: false,
            connect_attempts: 0,
            next_client: 1,
            clients: Vec::new(),
        }
    }

    async fn emit(&self, event: RadioEvent) -> bool {
        if let Err(e) = self.events.send(event).await {
            warn!("{}", e);
            return false;
        }
        true
    }

    async fn on_call(&mut self, call: RadioCall) -> bool {
        match call {
            RadioCall::Start => self.emit(RadioEvent::StationStarted).await,
            RadioCall::SetApConfig { .. } => {
                self.ap_running = true;
                true
            }
            RadioCall::Connect => {
                self.connect_attempts += 1;
                tokio::time::sleep(ASSOCIATION_DELAY).await;
                if self.connect_attempts == 1 {
                    self.emit(RadioEvent::StationDisconnected(
                        DisconnectReason::BasicRateUnsupported,
                    ))
                    .await
                } else {
                    self.associated = true;
                    let host = 100 + (self.connect_attempts % 100) as u8;
                    self.emit(RadioEvent::StationGotAddress(Ipv4Addr::new(
                        192, 168, 1, host,
                    )))
                    .await
                }
            }
            _ => true,
        }
    }

    async fn drop_link(&mut self) -> bool {
        if !self.associated {
            return true;
        }
        self.associated = false;
        self.emit(RadioEvent::StationDisconnected(
            DisconnectReason::BeaconTimeout,
        ))
        .await
    }

    async fn churn_clients(&mut self) -> bool {
        if !self.ap_running {
            return true;
        }
        if self.clients.len() < 2 {
            let client = ClientId {
                mac: [0x02, 0x00, 0x00, 0x00, 0x00, self.next_client],
                aid: self.next_client as u16,
            };
            self.next_client = self.next_client.wrapping_add(1);
            self.clients.push(client);
            self.emit(RadioEvent::ApClientJoined(client)).await
        } else {
            let client = self.clients.remove(0);
            self.emit(RadioEvent::ApClientLeft(client)).await
        }
    }

    async fn run(mut self, mut calls: UnboundedReceiver<RadioCall>, cancel: CancellationToken) {
        let mut link_drops = tokio::time::interval(LINK_DROP_INTERVAL);
        let mut client_churn = tokio::time::interval(CLIENT_CHURN_INTERVAL);
        // Both intervals fire immediately; skip that first tick
        link_drops.tick().await;
        client_churn.tick().await;

        loop {
            let ok = tokio::select! {
                _ = cancel.cancelled() => break,
                call = calls.recv() => match call {
                    Some(call) => self.on_call(call).await,
                    None => break,
                },
                _ = link_drops.tick() => self.drop_link().await,
                _ = client_churn.tick() => self.churn_clients().await,
            };
            if !ok {
                break;
            }
        }
        info!("Simulated air stopped");
        // Dropping `self.events` here lets the dispatcher finish
    }
}

async fn heartbeat(readiness: Readiness, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut beat = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                beat += 1;
                info!(
                    "Heartbeat #{} - station {}",
                    beat,
                    if readiness.is_station_connected() { "connected" } else { "not connected" }
                );
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== apsta-link host simulation starting ===");

    match BootCounter::at_default_path().map(|c| c.record_boot()) {
        Ok(Ok(count)) => info!("Run #{}", count),
        Ok(Err(e)) => warn!("Boot counter unavailable: {}", e),
        Err(e) => warn!("Boot counter unavailable: {}", e),
    }

    let creds = match credentials_from_env() {
        Ok(creds) => creds,
        Err(e) => {
            error!("Invalid credentials: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let (calls_tx, calls_rx) = tokio::sync::mpsc::unbounded_channel();
    let (sender, dispatcher) = EventDispatcher::new();

    let air = tokio::spawn(SimulatedAir::new(sender).run(calls_rx, cancel.clone()));

    let mut controller = ConnectivityController::new(SimRadio::with_observer(calls_tx));
    if let Err(e) = controller.initialize(creds.station(), creds.access_point()) {
        error!("Initialization failed: {}", e);
        std::process::exit(1);
    }

    let heartbeat_task = tokio::spawn(heartbeat(controller.readiness(), cancel.clone()));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
        }
        signal_cancel.cancel();
    });

    let summary = dispatcher.run(&mut controller).await;
    let _ = air.await;
    let _ = heartbeat_task.await;

    let stats = controller.stats();
    info!(
        "Delivered {} events ({} faults); {} connect attempts, {} link losses, {} fallbacks, {} AP starts",
        summary.delivered,
        summary.faults,
        stats.connect_attempts,
        stats.link_losses,
        stats.compatibility_fallbacks,
        stats.ap_starts
    );
}
