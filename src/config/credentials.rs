//! Station and access point credentials.
//!
//! Credentials are borrowed views into caller-owned buffers. Each view carries
//! its own length, so nothing here ever scans past the end of a buffer looking
//! for a terminator.
//!
//! # Example
//!
//! ```
//! use apsta_link::config::{ConfigError, Credentials};
//!
//! let creds = Credentials::new(b"HomeNetwork", b"hunter2hunter2");
//! assert!(creds.validate().is_ok());
//!
//! let secret = [b'x'; 70];
//! let creds = Credentials::new(b"HomeNetwork", &secret);
//! assert!(matches!(creds.validate(), Err(ConfigError::CredentialTooLong { .. })));
//! ```

use std::borrow::Cow;
use std::fmt;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum passphrase length for WPA2 (64 hex digits or 63 ASCII characters).
pub const MAX_PASSPHRASE_LEN: usize = 64;

/// Minimum passphrase length for WPA2.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Number of clients the access point accepts at once.
pub const AP_MAX_CONNECTIONS: u8 = 10;

/// Which half of a credential pair a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    /// The network identifier.
    Ssid,
    /// The network secret.
    Passphrase,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssid => write!(f, "SSID"),
            Self::Passphrase => write!(f, "passphrase"),
        }
    }
}

/// An SSID/passphrase pair borrowed from caller-supplied buffers.
///
/// Construction never fails; call [`Credentials::validate`] to check bounds.
/// The connectivity controller validates both pairs before touching the radio.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    ssid: &'a [u8],
    passphrase: &'a [u8],
}

impl<'a> Credentials<'a> {
    /// Create credentials from two explicit-length byte slices.
    pub const fn new(ssid: &'a [u8], passphrase: &'a [u8]) -> Self {
        Self { ssid, passphrase }
    }

    /// Create credentials for an open network (no passphrase).
    pub const fn open(ssid: &'a [u8]) -> Self {
        Self {
            ssid,
            passphrase: &[],
        }
    }

    /// Create credentials from fixed-size, NUL-padded buffers.
    ///
    /// Each field ends at its first NUL byte, or at the end of the buffer if
    /// there is none.
    pub fn from_padded(ssid_buf: &'a [u8], passphrase_buf: &'a [u8]) -> Self {
        Self {
            ssid: &ssid_buf[..terminated_len(ssid_buf)],
            passphrase: &passphrase_buf[..terminated_len(passphrase_buf)],
        }
    }

    /// Network identifier bytes.
    pub fn ssid(&self) -> &'a [u8] {
        self.ssid
    }

    /// Network secret bytes.
    pub fn passphrase(&self) -> &'a [u8] {
        self.passphrase
    }

    /// SSID for log output. Invalid UTF-8 is replaced, never rejected.
    pub fn ssid_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.ssid)
    }

    /// Check if this is an open network (no passphrase).
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// Validate both fields against their bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::CredentialTooLong {
                field: CredentialField::Ssid,
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if self.passphrase.len() > MAX_PASSPHRASE_LEN {
            return Err(ConfigError::CredentialTooLong {
                field: CredentialField::Passphrase,
                len: self.passphrase.len(),
                max: MAX_PASSPHRASE_LEN,
            });
        }
        // Empty is OK for open networks
        if !self.passphrase.is_empty() && self.passphrase.len() < MIN_PASSPHRASE_LEN {
            return Err(ConfigError::PassphraseTooShort {
                len: self.passphrase.len(),
                min: MIN_PASSPHRASE_LEN,
            });
        }
        Ok(())
    }
}

// Never print the passphrase.
impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid_lossy())
            .field("passphrase_len", &self.passphrase.len())
            .finish()
    }
}

/// Length of `buf` up to (not including) the first NUL byte.
pub(crate) fn terminated_len(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b == 0).unwrap_or(buf.len())
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// A credential field exceeds its maximum length.
    CredentialTooLong {
        field: CredentialField,
        len: usize,
        max: usize,
    },
    /// Passphrase is too short for WPA2.
    PassphraseTooShort { len: usize, min: usize },
    /// Invalid data format during deserialization.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::CredentialTooLong { field, len, max } => {
                write!(f, "{} too long: {} bytes (max {})", field, len, max)
            }
            Self::PassphraseTooShort { len, min } => {
                write!(f, "passphrase too short: {} bytes (min {})", len, min)
            }
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
