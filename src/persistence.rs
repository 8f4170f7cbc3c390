//! Flash storage for ESP32.
//!
//! - Station and AP credentials live in Non-Volatile Storage (NVS) so they
//!   survive reboots. They are written once by the `provision-credentials`
//!   binary and read at startup.
//! - The boot counter file lives on a SPIFFS partition mounted at `/spiffs`.
//!
//! # Usage
//!
//! ```ignore
//! use apsta_link::persistence;
//!
//! let nvs = persistence::init_nvs()?;
//! let creds = persistence::load_credentials(&nvs).ok_or("not provisioned")?;
//! persistence::mount_spiffs()?;
//! ```

use crate::config::{ProvisionedCredentials, MAX_SERIALIZED_LEN};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::{esp, EspError};
use log::info;
use std::ffi::CStr;
use std::sync::Mutex;
use zeroize::Zeroizing;

/// NVS namespace for credential storage.
const NVS_NAMESPACE: &str = "apsta_link";

/// NVS key for the serialized credential pairs.
const CREDENTIALS_KEY: &str = "credentials";

/// Mount point of the SPIFFS partition.
pub const SPIFFS_BASE_PATH: &str = "/spiffs";

const SPIFFS_BASE_PATH_C: &CStr = c"/spiffs";

/// Maximum files open on SPIFFS at once.
const SPIFFS_MAX_FILES: usize = 5;

static NVS_PARTITION: Mutex<Option<EspDefaultNvsPartition>> = Mutex::new(None);

/// Shared handle to the default NVS partition.
///
/// `EspDefaultNvsPartition::take()` succeeds only once per boot; this caches
/// the handle so the WiFi driver (calibration data) and credential storage can
/// both use it. Safe to call multiple times.
pub fn nvs_partition() -> Result<EspDefaultNvsPartition, EspError> {
    let mut cached = NVS_PARTITION.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(partition) = cached.as_ref() {
        return Ok(partition.clone());
    }
    let partition = EspDefaultNvsPartition::take()?;
    *cached = Some(partition.clone());
    Ok(partition)
}

/// Open the credential namespace.
pub fn init_nvs() -> Result<EspNvs<NvsDefault>, EspError> {
    EspNvs::new(nvs_partition()?, NVS_NAMESPACE, true)
}

/// Load credentials from NVS.
///
/// Returns `None` if nothing is stored or the stored data is corrupted.
pub fn load_credentials(nvs: &EspNvs<NvsDefault>) -> Option<ProvisionedCredentials> {
    let mut buf = Zeroizing::new([0u8; MAX_SERIALIZED_LEN]);

    let bytes = match nvs.get_raw(CREDENTIALS_KEY, &mut buf[..]) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::debug!("No credentials found in NVS");
            return None;
        }
        Err(e) => {
            log::warn!("Failed to read credentials from NVS: {:?}", e);
            return None;
        }
    };

    match ProvisionedCredentials::from_bytes(bytes) {
        Ok(creds) => Some(creds),
        Err(e) => {
            log::error!("Stored credentials are invalid: {}", e);
            None
        }
    }
}

/// Save credentials to NVS with read-back verification.
pub fn save_credentials(
    nvs: &mut EspNvs<NvsDefault>,
    creds: &ProvisionedCredentials,
) -> Result<(), EspError> {
    let bytes = creds.to_bytes();
    nvs.set_raw(CREDENTIALS_KEY, &bytes)?;

    // Read back and verify to catch silent flash write failures
    let mut verify_buf = Zeroizing::new([0u8; MAX_SERIALIZED_LEN]);
    let read_bytes = nvs
        .get_raw(CREDENTIALS_KEY, &mut verify_buf[..])?
        .ok_or_else(|| {
            log::error!("Credentials not found after save - possible flash failure");
            EspError::from_infallible::<{ esp_idf_sys::ESP_ERR_NVS_NOT_FOUND }>()
        })?;

    if read_bytes != bytes.as_slice() {
        log::error!("Credential verification failed - data mismatch after save");
        return Err(EspError::from_infallible::<
            { esp_idf_sys::ESP_ERR_INVALID_CRC },
        >());
    }

    info!("Credentials saved and verified in NVS");
    Ok(())
}

/// Clear stored credentials from NVS.
pub fn clear_credentials(nvs: &mut EspNvs<NvsDefault>) -> Result<(), EspError> {
    nvs.remove(CREDENTIALS_KEY)?;
    log::warn!("Credentials cleared from NVS");
    Ok(())
}

/// Register the SPIFFS partition at [`SPIFFS_BASE_PATH`].
///
/// The partition is formatted if it cannot be mounted.
pub fn mount_spiffs() -> Result<(), EspError> {
    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: SPIFFS_BASE_PATH_C.as_ptr(),
        partition_label: std::ptr::null(),
        max_files: SPIFFS_MAX_FILES,
        format_if_mount_failed: true,
    };

    // SAFETY: `conf` and the strings it points to outlive the call; the VFS
    // layer copies what it keeps.
    esp!(unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) })?;
    info!("SPIFFS mounted at {}", SPIFFS_BASE_PATH);
    Ok(())
}
