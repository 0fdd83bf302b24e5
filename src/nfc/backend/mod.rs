/// Backend abstraction module - host radio services
///
/// This module defines the trait the host platform implements to give the
/// procedure access to an NFC front-end: field control, ISO14443A
/// anticollision/selection, and bit-level transceive with CRC handling.

use core::time::Duration;

use bitflags::bitflags;

use crate::error::RadioError;

#[cfg(feature = "std")]
pub mod emulator;

/// Radio operating role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Reader / poller (PCD)
    Poller,
    /// Card emulation (PICC)
    Listener,
}

bitflags! {
    /// Technologies polled for during discovery
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Technology: u8 {
        const ISO14443A = 1;
        const ISO14443B = 1 << 1;
        const FELICA =    1 << 2;
        const ISO15693 =  1 << 3;
    }
}

/// Longest ISO14443A UID (triple size)
pub const MAX_UID_LEN: usize = 10;

/// Activation data of a selected ISO14443A tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagInfo {
    uid: [u8; MAX_UID_LEN],
    uid_len: usize,
    pub atqa: [u8; 2],
    pub sak: u8,
}

impl TagInfo {
    /// Ultralight family tags answer SELECT with SAK 0x00
    pub const ULTRALIGHT_SAK: u8 = 0x00;

    /// Build from a UID of 4, 7 or 10 bytes (longer input is truncated)
    pub fn new(uid: &[u8], atqa: [u8; 2], sak: u8) -> Self {
        let uid_len = uid.len().min(MAX_UID_LEN);
        let mut buf = [0u8; MAX_UID_LEN];
        buf[..uid_len].copy_from_slice(&uid[..uid_len]);
        Self {
            uid: buf,
            uid_len,
            atqa,
            sak,
        }
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid[..self.uid_len]
    }

    pub fn is_ultralight(&self) -> bool {
        self.sak == Self::ULTRALIGHT_SAK
    }
}

/// Host radio trait
///
/// Mirrors the services an NFC HAL offers a poller application. Framing,
/// parity and CRC are the implementation's business; callers deal in command
/// bytes and received bit counts only.
pub trait RadioBackend {
    /// Power up and initialize the front-end
    fn init(&mut self) -> Result<(), RadioError>;

    /// Select reader or card-emulation role
    fn set_role(&mut self, role: Role) -> Result<(), RadioError>;

    /// Start polling for the given technologies
    ///
    /// # Arguments
    /// * `technology` - Technologies to poll for
    /// * `uid_filter` - Only report tags whose UID starts with these bytes
    fn start_discovery(
        &mut self,
        technology: Technology,
        uid_filter: Option<&[u8]>,
    ) -> Result<(), RadioError>;

    /// Run anticollision and activate one tag in the field
    fn select(&mut self) -> Result<TagInfo, RadioError>;

    /// Transmit `bits` bits from `buf`
    fn transmit_bits(&mut self, buf: &[u8], bits: usize) -> Result<(), RadioError>;

    /// Wait up to `timeout` for a response, storing at most `buf.len()` bytes
    ///
    /// # Returns
    /// Number of bits received
    fn receive_bits(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RadioError>;

    /// Stop the poller and switch the field off
    fn stop(&mut self) -> Result<(), RadioError>;

    /// Release the front-end
    fn deinit(&mut self) -> Result<(), RadioError>;
}

impl<T: RadioBackend + ?Sized> RadioBackend for &mut T {
    fn init(&mut self) -> Result<(), RadioError> {
        (**self).init()
    }

    fn set_role(&mut self, role: Role) -> Result<(), RadioError> {
        (**self).set_role(role)
    }

    fn start_discovery(
        &mut self,
        technology: Technology,
        uid_filter: Option<&[u8]>,
    ) -> Result<(), RadioError> {
        (**self).start_discovery(technology, uid_filter)
    }

    fn select(&mut self) -> Result<TagInfo, RadioError> {
        (**self).select()
    }

    fn transmit_bits(&mut self, buf: &[u8], bits: usize) -> Result<(), RadioError> {
        (**self).transmit_bits(buf, bits)
    }

    fn receive_bits(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RadioError> {
        (**self).receive_bits(buf, timeout)
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        (**self).stop()
    }

    fn deinit(&mut self) -> Result<(), RadioError> {
        (**self).deinit()
    }
}
