/// Transaction types and frame builders for Ultralight commands

use super::commands::{Command, ResponseSize, PAGE_SIZE};

/// Longest frame this crate sends: opcode + address + one page
pub const MAX_FRAME_LEN: usize = 2 + PAGE_SIZE;

/// Transaction type (hardware-independent representation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Read four pages starting at `page`
    Read {
        page: u8,
    },
    /// Write one page
    Write {
        page: u8,
        data: [u8; PAGE_SIZE],
    },
}

impl TransactionType {
    /// Get the command for this transaction
    pub fn command(&self) -> Command {
        match self {
            Self::Read { .. } => Command::Read,
            Self::Write { .. } => Command::Write,
        }
    }

    /// Get the page address
    pub fn page(&self) -> u8 {
        match self {
            Self::Read { page } | Self::Write { page, .. } => *page,
        }
    }

    /// Get the expected response size
    pub fn response_size(&self) -> ResponseSize {
        match self {
            Self::Read { .. } => ResponseSize::Read,
            Self::Write { .. } => ResponseSize::Ack,
        }
    }

    /// Get the data to write (None for reads)
    pub fn write_data(&self) -> Option<[u8; PAGE_SIZE]> {
        match self {
            Self::Write { data, .. } => Some(*data),
            Self::Read { .. } => None,
        }
    }

    /// Encode the on-wire frame (CRC is appended by the transceiver)
    pub fn frame(&self) -> Frame {
        let mut frame = Frame {
            buf: [0u8; MAX_FRAME_LEN],
            len: 2,
        };
        frame.buf[0] = self.command().opcode();
        frame.buf[1] = self.page();
        if let Some(data) = self.write_data() {
            frame.buf[2..MAX_FRAME_LEN].copy_from_slice(&data);
            frame.len = MAX_FRAME_LEN;
        }
        frame
    }
}

/// Encoded command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Frame length in bits as handed to the transmitter
    pub fn bit_len(&self) -> usize {
        self.len * 8
    }
}

/// Transaction builder for fluent API
pub struct Transaction;

impl Transaction {
    /// Build a READ transaction
    pub fn read(page: u8) -> TransactionType {
        TransactionType::Read { page }
    }

    /// Build a WRITE transaction
    pub fn write(page: u8, data: [u8; PAGE_SIZE]) -> TransactionType {
        TransactionType::Write { page, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfc::protocol::commands::page;
    use hex_literal::hex;

    #[test]
    fn test_read_frame() {
        let txn = Transaction::read(page::LOCKS);
        assert_eq!(txn.command(), Command::Read);
        assert_eq!(txn.write_data(), None);
        assert_eq!(txn.response_size(), ResponseSize::Read);
        assert_eq!(txn.frame().as_bytes(), &hex!("30 02"));
        assert_eq!(txn.frame().bit_len(), 16);
    }

    #[test]
    fn test_write_frame() {
        let txn = Transaction::write(page::LOCKS, hex!("00 00 08 FF"));
        assert_eq!(txn.command(), Command::Write);
        assert_eq!(txn.page(), 0x02);
        assert_eq!(txn.response_size(), ResponseSize::Ack);
        assert_eq!(txn.frame().as_bytes(), &hex!("A2 02 00 00 08 FF"));
        assert_eq!(txn.frame().bit_len(), 48);
    }
}
