//! Station + access point firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== apsta-link starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Fatal: {}", e);
    }

    // Keep the task alive so the log stays readable on the serial monitor
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use apsta_link::boot_counter::BootCounter;
    use apsta_link::persistence;
    use apsta_link::radio::{subscribe_radio_events, EspRadio};
    use apsta_link::{ConnectivityController, CredentialStore, EventDispatcher, Readiness};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{info, warn};
    use std::time::Duration;

    /// How often the readiness monitor reports.
    const READINESS_LOG_INTERVAL: Duration = Duration::from_secs(30);

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = persistence::nvs_partition()?;
        let nvs = persistence::init_nvs()?;

        match persistence::mount_spiffs() {
            Ok(()) => match BootCounter::at_default_path()?.record_boot() {
                Ok(count) => info!("Boot #{}", count),
                Err(e) => warn!("Boot counter unavailable: {}", e),
            },
            Err(e) => warn!("SPIFFS mount failed, skipping boot counter: {:?}", e),
        }

        let creds = persistence::load_credentials(&nvs)
            .ok_or("no credentials in NVS; flash provision-credentials first")?;

        let radio = EspRadio::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;

        // Subscribe before initializing so StationStarted is not missed
        let (sender, dispatcher) = EventDispatcher::new();
        let _subscriptions = subscribe_radio_events(&sysloop, sender)?;

        let mut controller = ConnectivityController::new(radio);
        controller.initialize(creds.station(), creds.access_point())?;
        spawn_readiness_monitor(controller.readiness())?;

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let summary = runtime.block_on(dispatcher.run(&mut controller));
        warn!("Event delivery ended after {} events", summary.delivered);
        Ok(())
    }

    fn spawn_readiness_monitor(readiness: Readiness) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("readiness".into())
            .stack_size(4096)
            .spawn(move || loop {
                std::thread::sleep(READINESS_LOG_INTERVAL);
                if readiness.is_station_connected() {
                    info!("Station connected");
                } else {
                    info!("Station not connected");
                }
            })?;
        Ok(())
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-link' to run against the simulated radio.");
}
