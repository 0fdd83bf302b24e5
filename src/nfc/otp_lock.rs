/// Lock the OTP page of a MIFARE Ultralight tag
///
/// Reads the lock page, sets the OTP lock bit, writes the page back and reads
/// it again to confirm. Every step gates the next; the radio is released on
/// every exit path.

use core::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{Cause, Error};
use super::backend::{RadioBackend, TagInfo};
use super::protocol::commands::{ack, page, ResponseSize};
use super::protocol::lock::LockPage;
use super::protocol::transaction::Transaction;
use super::session::RadioSession;
use super::LOG_TARGET;

const READ_LEN: usize = ResponseSize::Read as usize;
const ACK_LEN: usize = ResponseSize::Ack as usize;

/// Procedure settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for each response
    pub rx_timeout: Duration,
}

impl Config {
    pub const DEFAULT_RX_TIMEOUT: Duration = Duration::from_millis(500);
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rx_timeout: Self::DEFAULT_RX_TIMEOUT,
        }
    }
}

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Bit written and confirmed by the read-back
    Locked { lock_page: LockPage },
    /// Bit was already set; nothing written
    AlreadyLocked { lock_page: LockPage },
    /// Tag acknowledged the write but the read-back shows the bit clear
    VerifyMismatch { written: LockPage, read_back: LockPage },
}

impl LockOutcome {
    /// OTP page is read-only after this run
    pub fn is_locked(&self) -> bool {
        !matches!(self, Self::VerifyMismatch { .. })
    }
}

/// OTP locker - works with any radio backend
pub struct OtpLocker<R: RadioBackend> {
    radio: R,
    config: Config,
}

impl<R: RadioBackend> OtpLocker<R> {
    /// Create a locker with default settings
    pub fn new(radio: R) -> Self {
        Self::with_config(radio, Config::default())
    }

    pub fn with_config(radio: R, config: Config) -> Self {
        Self { radio, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_inner(self) -> R {
        self.radio
    }

    /// Lock the OTP page of the tag in the field
    ///
    /// This performs:
    /// 1. Radio init, poller role, ISO14443A discovery
    /// 2. Tag select
    /// 3. READ of the lock page
    /// 4. OTP lock bit computation (early exit if already set)
    /// 5. WRITE of the lock page, ACK check
    /// 6. Verification READ
    ///
    /// Teardown runs on every path, including errors.
    pub fn lock_otp(&mut self) -> Result<LockOutcome, Error> {
        info!(target: LOG_TARGET, "Start");
        let timeout = self.config.rx_timeout;

        // Step 1: Init
        let mut session = RadioSession::open(&mut self.radio)?;

        // Step 2: Select
        select_tag(&mut session)?;

        // Step 3: Read lock page
        let current = read_lock_page(&mut session, timeout).map_err(|cause| {
            error!(target: LOG_TARGET, "READ failed: {cause}");
            Error::ReadFailed(cause)
        })?;
        debug!(target: LOG_TARGET, "Lock page {:02X?}", current.bytes());

        // Step 4: Compute mutation
        let target = current.with_otp_locked();
        if target == current {
            info!(target: LOG_TARGET, "OTP already locked");
            return Ok(LockOutcome::AlreadyLocked { lock_page: current });
        }
        if current.otp_lock_frozen() {
            warn!(target: LOG_TARGET, "OTP lock bit is block-locked, write may have no effect");
        }

        // Step 5: Write, bytes 0, 1 and 3 go back exactly as read
        write_lock_page(&mut session, target, timeout)?;

        // Step 6: Verify
        let read_back = read_lock_page(&mut session, timeout).map_err(|cause| {
            error!(target: LOG_TARGET, "Post-READ failed: {cause}");
            Error::VerifyReadFailed(cause)
        })?;

        if read_back.is_otp_locked() {
            info!(target: LOG_TARGET, "OTP locked");
            Ok(LockOutcome::Locked { lock_page: read_back })
        } else {
            warn!(target: LOG_TARGET, "Verify failed: lock page reads {:02X?}", read_back.bytes());
            Ok(LockOutcome::VerifyMismatch {
                written: target,
                read_back,
            })
        }
    }

    /// Read the lock page without changing anything
    pub fn read_lock_page(&mut self) -> Result<LockPage, Error> {
        let timeout = self.config.rx_timeout;
        let mut session = RadioSession::open(&mut self.radio)?;
        select_tag(&mut session)?;

        read_lock_page(&mut session, timeout).map_err(|cause| {
            error!(target: LOG_TARGET, "READ failed: {cause}");
            Error::ReadFailed(cause)
        })
    }
}

fn select_tag<R: RadioBackend>(session: &mut RadioSession<R>) -> Result<TagInfo, Error> {
    let tag = session.select().inspect_err(|e| {
        error!(target: LOG_TARGET, "No tag / select failed: {e}");
    })?;

    debug!(
        target: LOG_TARGET,
        "Selected UID {:02X?} ATQA {:02X?} SAK {:#04X}",
        tag.uid(),
        tag.atqa,
        tag.sak
    );
    if !tag.is_ultralight() {
        warn!(target: LOG_TARGET, "SAK {:#04X} is not an Ultralight tag", tag.sak);
    }

    Ok(tag)
}

/// READ page 2 and keep its 4 bytes out of the 16 returned
fn read_lock_page<R: RadioBackend>(
    session: &mut RadioSession<R>,
    timeout: Duration,
) -> Result<LockPage, Cause> {
    let frame = Transaction::read(page::LOCKS).frame();
    let response = session.exchange::<READ_LEN>(frame.as_bytes(), timeout)?;

    let short = Cause::ShortResponse {
        received: response.byte_len(),
        expected: READ_LEN,
    };
    if response.byte_len() < READ_LEN {
        return Err(short);
    }
    LockPage::from_read_response(response.data()).ok_or(short)
}

fn write_lock_page<R: RadioBackend>(
    session: &mut RadioSession<R>,
    lock_page: LockPage,
    timeout: Duration,
) -> Result<(), Error> {
    let frame = Transaction::write(page::LOCKS, lock_page.bytes()).frame();
    let response = session
        .exchange::<ACK_LEN>(frame.as_bytes(), timeout)
        .map_err(|e| {
            error!(target: LOG_TARGET, "WRITE no resp: {e}");
            Error::WriteNotAcknowledged(Cause::Radio(e))
        })?;

    let value = response.data().first().map_or(0, |b| b & ack::MASK);
    if response.bits() != ack::BITS || value != ack::ACK {
        error!(target: LOG_TARGET, "WRITE NAK ({} bits, {:#X})", response.bits(), value);
        return Err(Error::WriteNotAcknowledged(Cause::BadAck {
            bits: response.bits(),
            value,
        }));
    }

    Ok(())
}
