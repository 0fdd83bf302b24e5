/// Static lock bytes of an Ultralight tag (page 2, bytes 2 and 3)
///
/// Lock bits are one-way: once set they can never be cleared. Block-lock bits
/// freeze the corresponding lock bits in their current state.

use bitflags::bitflags;

use super::commands::{page, PAGE_SIZE};

bitflags! {
    /// Lock byte 0 (page 2, byte 2)
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct StaticLock0: u8 {
        const BL_OTP =     1;          // freezes L_OTP
        const BL_4_9 =     1 << 1;     // freezes L_4..L_7 and L_8, L_9
        const BL_10_15 =   1 << 2;     // freezes L_10..L_15
        const L_OTP =      1 << 3;     // OTP page read-only
        const L_4 =        1 << 4;
        const L_5 =        1 << 5;
        const L_6 =        1 << 6;
        const L_7 =        1 << 7;
    }
}

bitflags! {
    /// Lock byte 1 (page 2, byte 3)
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct StaticLock1: u8 {
        const L_8 =  1;
        const L_9 =  1 << 1;
        const L_10 = 1 << 2;
        const L_11 = 1 << 3;
        const L_12 = 1 << 4;
        const L_13 = 1 << 5;
        const L_14 = 1 << 6;
        const L_15 = 1 << 7;
    }
}

/// Contents of the lock-control page (page 2)
///
/// Bytes 0 and 1 hold BCC1 and an internal byte; bytes 2 and 3 hold the
/// static lock bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPage {
    bytes: [u8; PAGE_SIZE],
}

impl LockPage {
    pub const fn new(bytes: [u8; PAGE_SIZE]) -> Self {
        Self { bytes }
    }

    /// Take the first page of a READ response. `None` if shorter than a page.
    pub fn from_read_response(data: &[u8]) -> Option<Self> {
        let bytes: [u8; PAGE_SIZE] = data.get(..PAGE_SIZE)?.try_into().ok()?;
        Some(Self::new(bytes))
    }

    pub fn bytes(&self) -> [u8; PAGE_SIZE] {
        self.bytes
    }

    pub fn lock0(&self) -> StaticLock0 {
        StaticLock0::from_bits_retain(self.bytes[2])
    }

    pub fn lock1(&self) -> StaticLock1 {
        StaticLock1::from_bits_retain(self.bytes[3])
    }

    /// OTP page (page 3) is read-only
    pub fn is_otp_locked(&self) -> bool {
        self.lock0().contains(StaticLock0::L_OTP)
    }

    /// The OTP lock bit itself can no longer change
    pub fn otp_lock_frozen(&self) -> bool {
        self.lock0().contains(StaticLock0::BL_OTP)
    }

    /// Same page with the OTP lock bit set. Bytes 0, 1 and 3 are untouched.
    pub fn with_otp_locked(&self) -> Self {
        let mut bytes = self.bytes;
        bytes[2] = (self.lock0() | StaticLock0::L_OTP).bits();
        Self::new(bytes)
    }

    /// Whether `page` is write-protected by these lock bits
    pub fn is_page_locked(&self, page: u8) -> bool {
        match page {
            page::OTP => self.is_otp_locked(),
            4..=7 => self.bytes[2] & (1 << page) != 0,
            8..=15 => self.bytes[3] & (1 << (page - 8)) != 0,
            _ => false,
        }
    }

    /// Pages 3..=15 currently locked
    pub fn locked_pages(&self) -> impl Iterator<Item = u8> + '_ {
        (page::OTP..page::COUNT).filter(move |&p| self.is_page_locked(p))
    }
}

impl From<[u8; PAGE_SIZE]> for LockPage {
    fn from(bytes: [u8; PAGE_SIZE]) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_otp_bit_is_bit3_of_byte2() {
        assert!(!LockPage::new(hex!("00 00 F7 FF")).is_otp_locked());
        assert!(LockPage::new(hex!("00 00 08 00")).is_otp_locked());
    }

    #[test]
    fn test_with_otp_locked_only_flips_one_bit() {
        for b2 in 0..=u8::MAX {
            let page = LockPage::new([0x5A, 0xA5, b2, 0x3C]);
            let locked = page.with_otp_locked();
            assert_eq!(locked.bytes(), [0x5A, 0xA5, b2 | 0x08, 0x3C]);
            assert!(locked.is_otp_locked());
        }
    }

    #[test]
    fn test_from_read_response() {
        let data = hex!("11 22 33 44 55 66 77 88 99 AA BB CC DD EE FF 00");
        let page = LockPage::from_read_response(&data).unwrap();
        assert_eq!(page.bytes(), hex!("11 22 33 44"));
        assert_eq!(LockPage::from_read_response(&data[..3]), None);
    }

    #[test]
    fn test_locked_pages() {
        let page = LockPage::new(hex!("00 00 19 81"));
        assert!(page.otp_lock_frozen());
        let locked: Vec<u8> = page.locked_pages().collect();
        assert_eq!(locked, vec![3, 4, 8, 15]);
    }

    #[test]
    fn test_block_lock_bits_do_not_lock_pages() {
        let page = LockPage::new(hex!("00 00 07 00"));
        assert_eq!(page.locked_pages().count(), 0);
    }
}
