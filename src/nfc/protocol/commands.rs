/// Command and page definitions for the MIFARE Ultralight command set

/// Ultralight command opcode (first byte of every frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// READ four pages starting at the given address (0x30)
    Read = 0x30,
    /// WRITE one page (0xA2)
    Write = 0xA2,
}

impl Command {
    /// Get the opcode byte
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Create from raw opcode
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x30 => Some(Self::Read),
            0xA2 => Some(Self::Write),
            _ => None,
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.opcode()
    }
}

/// Page addresses on an Ultralight memory map
pub mod page {
    /// Serial number, first part (UID0..UID2 + BCC0)
    pub const SERIAL_0: u8 = 0x00;
    /// Serial number, second part (UID3..UID6)
    pub const SERIAL_1: u8 = 0x01;
    /// BCC1, internal byte, static lock bytes 0 and 1
    pub const LOCKS: u8 = 0x02;
    /// One-time-programmable page
    pub const OTP: u8 = 0x03;
    /// First user data page
    pub const USER_START: u8 = 0x04;
    /// Number of pages on an MF0ICU1
    pub const COUNT: u8 = 16;
}

/// Bytes in one page
pub const PAGE_SIZE: usize = 4;

/// Pages returned by one READ
pub const PAGES_PER_READ: usize = 4;

/// ACK / NAK nibbles. The tag answers WRITE with a 4-bit frame.
pub mod ack {
    /// Write accepted
    pub const ACK: u8 = 0x0A;
    /// Invalid argument (address out of range, page locked)
    pub const NAK_INVALID_ARGUMENT: u8 = 0x00;
    /// Parity or CRC error on the command frame
    pub const NAK_PARITY_CRC: u8 = 0x01;
    /// Length of the ACK/NAK frame in bits
    pub const BITS: usize = 4;
    /// Nibble carrying the value
    pub const MASK: u8 = 0x0F;
}

/// Expected response size per command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSize {
    /// READ answers with four pages (16 bytes)
    Read = 16,
    /// WRITE answers with a single nibble, delivered in one byte
    Ack = 1,
}

impl ResponseSize {
    /// Get the size in bytes
    pub fn bytes(self) -> usize {
        self as usize
    }
}
