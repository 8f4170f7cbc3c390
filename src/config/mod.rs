//! Credential configuration.
//!
//! # Components
//!
//! - [`credentials`] - bounded SSID/passphrase views and validation (host-testable)
//! - [`store`] - owned, zeroizing credential storage and its byte format

mod credentials;
mod store;

pub use credentials::{
    ConfigError, CredentialField, Credentials, AP_MAX_CONNECTIONS, MAX_PASSPHRASE_LEN,
    MAX_SSID_LEN, MIN_PASSPHRASE_LEN,
};
pub use store::{CredentialBuffer, CredentialStore, ProvisionedCredentials, MAX_SERIALIZED_LEN};
