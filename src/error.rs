use thiserror::Error as DeriveError;

/// Failures reported by the host radio
#[derive(DeriveError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    #[error("No tag in field")]
    NoTag,

    #[error("Radio timeout")]
    Timeout,

    #[error("Transmission rejected")]
    TxRejected,

    #[error("Protocol error (collision, parity or CRC)")]
    Protocol,

    #[error("Receive buffer too small")]
    BufferOverflow,

    #[error("Radio not ready")]
    NotReady,

    #[error("Radio hardware fault")]
    Hardware,
}

/// Why a single command exchange did not produce a usable answer
#[derive(DeriveError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    #[error("{0}")]
    Radio(#[from] RadioError),

    #[error("short response: {received} of {expected} bytes")]
    ShortResponse { received: usize, expected: usize },

    #[error("bad ACK: {bits} bits, value {value:#X}")]
    BadAck { bits: usize, value: u8 },
}

#[derive(DeriveError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Radio initialization failed: {0}")]
    InitFailed(RadioError),

    #[error("No tag found")]
    NoTagFound,

    #[error("Tag select failed: {0}")]
    SelectFailed(RadioError),

    #[error("READ of lock page failed: {0}")]
    ReadFailed(Cause),

    #[error("WRITE not acknowledged: {0}")]
    WriteNotAcknowledged(Cause),

    #[error("Post-write READ failed: {0}")]
    VerifyReadFailed(Cause),
}
