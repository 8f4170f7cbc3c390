//! Owned credential storage.
//!
//! [`ProvisionedCredentials`] owns the station and access point pairs in
//! fixed-size buffers and lends them out as [`Credentials`] views. The buffers
//! are wiped when dropped.

use super::credentials::{
    ConfigError, CredentialField, Credentials, MAX_PASSPHRASE_LEN, MAX_SSID_LEN,
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Serialized size upper bound: four length-prefixed fields.
/// Format: `[len:1][sta_ssid][len:1][sta_pass][len:1][ap_ssid][len:1][ap_pass]`.
pub const MAX_SERIALIZED_LEN: usize = 4 + 2 * (MAX_SSID_LEN + MAX_PASSPHRASE_LEN);

/// Read-only source of the credential pairs used at startup.
pub trait CredentialStore {
    /// Credentials of the upstream network to join as a station.
    fn station(&self) -> Credentials<'_>;

    /// Credentials of the network this device serves as an access point.
    fn access_point(&self) -> Credentials<'_>;
}

/// One SSID/passphrase pair in fixed buffers.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialBuffer {
    ssid: [u8; MAX_SSID_LEN],
    ssid_len: u8,
    passphrase: [u8; MAX_PASSPHRASE_LEN],
    passphrase_len: u8,
}

impl CredentialBuffer {
    /// Copy a validated pair into owned buffers.
    pub fn new(ssid: &[u8], passphrase: &[u8]) -> Result<Self, ConfigError> {
        Credentials::new(ssid, passphrase).validate()?;

        let mut buf = Self {
            ssid: [0; MAX_SSID_LEN],
            ssid_len: ssid.len() as u8,
            passphrase: [0; MAX_PASSPHRASE_LEN],
            passphrase_len: passphrase.len() as u8,
        };
        buf.ssid[..ssid.len()].copy_from_slice(ssid);
        buf.passphrase[..passphrase.len()].copy_from_slice(passphrase);
        Ok(buf)
    }

    /// Borrow the stored pair.
    pub fn as_credentials(&self) -> Credentials<'_> {
        Credentials::new(
            &self.ssid[..self.ssid_len as usize],
            &self.passphrase[..self.passphrase_len as usize],
        )
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let creds = self.as_credentials();
        out.push(self.ssid_len);
        out.extend_from_slice(creds.ssid());
        out.push(self.passphrase_len);
        out.extend_from_slice(creds.passphrase());
    }

    fn read_from(bytes: &[u8], pos: &mut usize) -> Result<Self, ConfigError> {
        let ssid = read_field(bytes, pos, CredentialField::Ssid, MAX_SSID_LEN)?;
        let passphrase = read_field(bytes, pos, CredentialField::Passphrase, MAX_PASSPHRASE_LEN)?;
        Self::new(ssid, passphrase)
    }
}

fn read_field<'b>(
    bytes: &'b [u8],
    pos: &mut usize,
    field: CredentialField,
    max: usize,
) -> Result<&'b [u8], ConfigError> {
    let len = *bytes
        .get(*pos)
        .ok_or_else(|| ConfigError::InvalidFormat(format!("missing {} length", field)))?
        as usize;
    if len > max {
        return Err(ConfigError::CredentialTooLong { field, len, max });
    }
    let start = *pos + 1;
    let value = bytes
        .get(start..start + len)
        .ok_or_else(|| ConfigError::InvalidFormat(format!("truncated {}", field)))?;
    *pos = start + len;
    Ok(value)
}

/// Station and access point credentials provisioned at runtime.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ProvisionedCredentials {
    station: CredentialBuffer,
    access_point: CredentialBuffer,
}

impl ProvisionedCredentials {
    /// Validate and copy both pairs.
    pub fn new(
        station_ssid: &[u8],
        station_passphrase: &[u8],
        ap_ssid: &[u8],
        ap_passphrase: &[u8],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            station: CredentialBuffer::new(station_ssid, station_passphrase)?,
            access_point: CredentialBuffer::new(ap_ssid, ap_passphrase)?,
        })
    }

    /// Serialize to bytes for NVS storage. The returned buffer is wiped on drop.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(MAX_SERIALIZED_LEN));
        self.station.write_to(&mut bytes);
        self.access_point.write_to(&mut bytes);
        bytes
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.is_empty() {
            return Err(ConfigError::InvalidFormat("empty data".into()));
        }

        let mut pos = 0;
        let station = CredentialBuffer::read_from(bytes, &mut pos)?;
        let access_point = CredentialBuffer::read_from(bytes, &mut pos)?;
        if pos != bytes.len() {
            return Err(ConfigError::InvalidFormat(format!(
                "{} trailing bytes",
                bytes.len() - pos
            )));
        }

        Ok(Self {
            station,
            access_point,
        })
    }
}

impl CredentialStore for ProvisionedCredentials {
    fn station(&self) -> Credentials<'_> {
        self.station.as_credentials()
    }

    fn access_point(&self) -> Credentials<'_> {
        self.access_point.as_credentials()
    }
}

impl std::fmt::Debug for ProvisionedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedCredentials")
            .field("station", &self.station())
            .field("access_point", &self.access_point())
            .finish()
    }
}
