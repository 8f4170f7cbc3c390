//! Station readiness flag.
//!
//! The controller holds the only writer ([`ConnectedBit`]); any number of
//! [`Readiness`] handles may read it from any thread without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writer half of the readiness flag. Owned by the connectivity controller.
#[derive(Debug, Default)]
pub(crate) struct ConnectedBit {
    flag: Arc<AtomicBool>,
}

impl ConnectedBit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub(crate) fn get(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn readiness(&self) -> Readiness {
        Readiness {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Read-only view of whether the station currently holds an address.
///
/// Cheap to clone; hand one to every component that needs network access.
#[derive(Debug, Clone)]
pub struct Readiness {
    flag: Arc<AtomicBool>,
}

impl Readiness {
    /// Returns true while the station is associated and has an address.
    pub fn is_station_connected(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
