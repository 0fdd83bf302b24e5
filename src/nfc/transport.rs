//! Transport adapter: one request out, one bit-counted response back.

use core::time::Duration;

use log::debug;

use crate::error::RadioError;
use super::backend::RadioBackend;
use super::LOG_TARGET;

/// Bit-counted response held in a fixed-capacity buffer of `N` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<const N: usize> {
    buf: [u8; N],
    bits: usize,
}

impl<const N: usize> Response<N> {
    pub fn new(buf: [u8; N], bits: usize) -> Self {
        Self { buf, bits }
    }

    /// Number of bits the radio reported
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Received length rounded up to whole bytes
    pub fn byte_len(&self) -> usize {
        self.bits.div_ceil(8)
    }

    /// Received bytes; never longer than the buffer
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.byte_len().min(N)]
    }
}

/// Send `request` and wait up to `timeout` for at most `N` response bytes
///
/// No retries: any transmit or receive failure is handed straight back.
pub fn exchange<R, const N: usize>(
    radio: &mut R,
    request: &[u8],
    timeout: Duration,
) -> Result<Response<N>, RadioError>
where
    R: RadioBackend + ?Sized,
{
    debug!(target: LOG_TARGET, "TX {:02X?}", request);
    radio.transmit_bits(request, request.len() * 8)?;

    let mut buf = [0u8; N];
    let bits = radio.receive_bits(&mut buf, timeout)?;
    let response = Response::new(buf, bits);
    debug!(target: LOG_TARGET, "RX {} bits {:02X?}", bits, response.data());

    Ok(response)
}
