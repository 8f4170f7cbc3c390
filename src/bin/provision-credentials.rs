//! Credential provisioning utility for ESP32.
//!
//! Stores the station and access point credentials to NVS for use by the
//! firmware.
//!
//! Usage:
//!   APSTA_STA_SSID="Upstream" APSTA_STA_PASSWORD="secret" \
//!   APSTA_AP_SSID="DeviceAp" APSTA_AP_PASSWORD="apsecret" \
//!   cargo espflash flash --bin provision-credentials --features esp32 --monitor
//!
//! Leave `APSTA_AP_PASSWORD` empty for an open access point. Set
//! `APSTA_STA_SSID=""` to erase stored credentials instead.
//!
//! After running this once, the ESP32 will remember the credentials across reboots.

/// Upstream SSID - set via APSTA_STA_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const STA_SSID: Option<&str> = option_env!("APSTA_STA_SSID");

/// Upstream password - set via APSTA_STA_PASSWORD at compile time.
#[cfg(feature = "esp32")]
const STA_PASSWORD: Option<&str> = option_env!("APSTA_STA_PASSWORD");

/// Access point SSID - set via APSTA_AP_SSID at compile time.
#[cfg(feature = "esp32")]
const AP_SSID: Option<&str> = option_env!("APSTA_AP_SSID");

/// Access point password - set via APSTA_AP_PASSWORD at compile time.
#[cfg(feature = "esp32")]
const AP_PASSWORD: Option<&str> = option_env!("APSTA_AP_PASSWORD");

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Provisioning failed ===\n");
    // Brief pause to ensure serial output is flushed before process exits
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use apsta_link::config::{CredentialStore, ProvisionedCredentials};
    use apsta_link::persistence::{
        clear_credentials, init_nvs, load_credentials, save_credentials,
    };

    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== Credential Provisioning Utility ===\n");

    if STA_SSID == Some("") {
        let mut nvs = match init_nvs() {
            Ok(nvs) => nvs,
            Err(e) => halt_with_error(&format!("Error: failed to open NVS: {:?}", e)),
        };
        if let Err(e) = clear_credentials(&mut nvs) {
            halt_with_error(&format!("Error: failed to clear credentials: {:?}", e));
        }
        if load_credentials(&nvs).is_some() {
            halt_with_error("Error: credentials still present after clearing");
        }
        println!("\n=== Credentials erased ===\n");
        loop {
            std::thread::sleep(std::time::Duration::from_secs(60));
        }
    }

    let (sta_ssid, ap_ssid) = match (STA_SSID, AP_SSID) {
        (Some(sta), Some(ap)) if !sta.is_empty() && !ap.is_empty() => (sta, ap),
        _ => halt_with_error(
            "Error: APSTA_STA_SSID and APSTA_AP_SSID must be set at compile time.\n\n\
             Usage:\n  \
             APSTA_STA_SSID=\"Upstream\" APSTA_STA_PASSWORD=\"secret\" \\\n  \
             APSTA_AP_SSID=\"DeviceAp\" APSTA_AP_PASSWORD=\"apsecret\" \\\n  \
             cargo espflash flash --bin provision-credentials --features esp32",
        ),
    };

    let creds = match ProvisionedCredentials::new(
        sta_ssid.as_bytes(),
        STA_PASSWORD.unwrap_or("").as_bytes(),
        ap_ssid.as_bytes(),
        AP_PASSWORD.unwrap_or("").as_bytes(),
    ) {
        Ok(creds) => creds,
        Err(e) => halt_with_error(&format!("Error: invalid credentials: {}", e)),
    };

    println!("Station SSID: {}", creds.station().ssid_lossy());
    println!("AP SSID:      {}", creds.access_point().ssid_lossy());
    if creds.access_point().is_open() {
        println!("AP security:  open");
    }

    let mut nvs = match init_nvs() {
        Ok(nvs) => nvs,
        Err(e) => halt_with_error(&format!("Error: failed to open NVS: {:?}", e)),
    };

    if let Err(e) = save_credentials(&mut nvs, &creds) {
        halt_with_error(&format!("Error: failed to save credentials: {:?}", e));
    }

    match load_credentials(&nvs) {
        Some(stored) if stored.station() == creds.station() => {
            println!("\n=== Credentials stored ===\n");
        }
        _ => halt_with_error("Error: stored credentials did not read back"),
    }

    // Keep the task alive so the monitor shows the result
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("The host simulator reads APSTA_* environment variables at runtime instead.");
}
