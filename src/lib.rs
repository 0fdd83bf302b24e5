#![cfg_attr(not(feature = "std"), no_std)]

pub mod error;
pub mod nfc;

pub use error::{Cause, Error, RadioError};
pub use nfc::backend::{RadioBackend, Role, TagInfo, Technology};
#[cfg(feature = "std")]
pub use nfc::backend::emulator::UltralightEmulator;
pub use nfc::otp_lock::{Config, LockOutcome, OtpLocker};
pub use nfc::protocol::lock::{LockPage, StaticLock0, StaticLock1};
