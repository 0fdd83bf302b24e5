//! Scoped radio session.
//!
//! Opening a session powers the radio up in poller mode and starts ISO14443A
//! discovery. Dropping it stops the poller and releases the radio, whichever
//! way the caller leaves the scope.

use core::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, RadioError};
use super::backend::{RadioBackend, Role, TagInfo, Technology};
use super::transport::{self, Response};
use super::LOG_TARGET;

pub struct RadioSession<R: RadioBackend> {
    radio: R,
    closed: bool,
}

impl<R: RadioBackend> RadioSession<R> {
    /// Initialize the radio and begin unfiltered ISO14443A discovery
    ///
    /// Teardown runs even if one of these calls fails.
    pub fn open(radio: R) -> Result<Self, Error> {
        let mut session = Self {
            radio,
            closed: false,
        };

        session.radio.init().map_err(Error::InitFailed)?;
        session.radio.set_role(Role::Poller).map_err(Error::InitFailed)?;
        session
            .radio
            .start_discovery(Technology::ISO14443A, None)
            .map_err(Error::InitFailed)?;

        Ok(session)
    }

    /// Anticollision + activation of one tag
    pub fn select(&mut self) -> Result<TagInfo, Error> {
        match self.radio.select() {
            Ok(tag) => Ok(tag),
            Err(RadioError::NoTag) => Err(Error::NoTagFound),
            Err(e) => Err(Error::SelectFailed(e)),
        }
    }

    /// See [`transport::exchange`]
    pub fn exchange<const N: usize>(
        &mut self,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Response<N>, RadioError> {
        transport::exchange(&mut self.radio, request, timeout)
    }

    /// Tear down now instead of at end of scope
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.radio.stop() {
            warn!(target: LOG_TARGET, "Poller stop failed: {e}");
        }
        if let Err(e) = self.radio.deinit() {
            warn!(target: LOG_TARGET, "Radio deinit failed: {e}");
        }
        debug!(target: LOG_TARGET, "Radio released");
        info!(target: LOG_TARGET, "Done");
    }
}

impl<R: RadioBackend> Drop for RadioSession<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfc::backend::emulator::UltralightEmulator;

    #[test]
    fn test_drop_tears_down_once() {
        let mut emu = UltralightEmulator::default();
        {
            let mut session = RadioSession::open(&mut emu).unwrap();
            session.select().unwrap();
        }
        assert_eq!(emu.stop_calls(), 1);
        assert_eq!(emu.deinit_calls(), 1);
        assert!(!emu.is_powered());
    }

    #[test]
    fn test_close_then_drop_tears_down_once() {
        let mut emu = UltralightEmulator::default();
        let session = RadioSession::open(&mut emu).unwrap();
        session.close();
        assert_eq!(emu.stop_calls(), 1);
        assert_eq!(emu.deinit_calls(), 1);
    }

    #[test]
    fn test_failed_init_still_tears_down() {
        let mut emu = UltralightEmulator::default().failing_init(RadioError::Hardware);
        assert!(matches!(
            RadioSession::open(&mut emu),
            Err(Error::InitFailed(RadioError::Hardware))
        ));
        assert_eq!(emu.stop_calls(), 1);
        assert_eq!(emu.deinit_calls(), 1);
    }

    #[test]
    fn test_select_error_mapping() {
        let mut emu = UltralightEmulator::default().without_tag();
        let mut session = RadioSession::open(&mut emu).unwrap();
        assert_eq!(session.select(), Err(Error::NoTagFound));
        drop(session);

        let mut emu = UltralightEmulator::default().failing_select(RadioError::Protocol);
        let mut session = RadioSession::open(&mut emu).unwrap();
        assert_eq!(session.select(), Err(Error::SelectFailed(RadioError::Protocol)));
    }
}
