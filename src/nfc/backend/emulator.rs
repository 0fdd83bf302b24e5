/// In-memory MIFARE Ultralight tag behind a poller
///
/// Implements [`RadioBackend`] by answering READ and WRITE the way an
/// MF0ICU1 does, with hooks for injecting the failures a real field produces.
/// It also counts init/stop/deinit calls so callers can check teardown.

use core::time::Duration;

use crate::error::RadioError;
use crate::nfc::protocol::commands::{ack, page, Command, PAGES_PER_READ, PAGE_SIZE};
use crate::nfc::protocol::lock::{LockPage, StaticLock0, StaticLock1};
use super::{RadioBackend, Role, TagInfo, Technology};

/// Cascade tag, folded into BCC0
const CT: u8 = 0x88;

/// ATQA of an Ultralight tag
const ULTRALIGHT_ATQA: [u8; 2] = [0x44, 0x00];

/// Internal byte of page 2 on MF0ICU1
const INTERNAL: u8 = 0x48;

const PAGES: usize = page::COUNT as usize;

pub struct UltralightEmulator {
    memory: [[u8; PAGE_SIZE]; PAGES],
    uid: [u8; 7],
    sak: u8,
    present: bool,

    // Fault injection
    init_error: Option<RadioError>,
    select_error: Option<RadioError>,
    tx_error: Option<RadioError>,
    read_len: Option<usize>,
    reads_answered: Option<usize>,
    ack_override: Option<(u8, usize)>,
    ignore_writes: bool,
    mute_writes: bool,

    // Radio state
    powered: bool,
    role: Option<Role>,
    discovering: bool,
    uid_filter: Option<Vec<u8>>,
    selected: bool,
    pending: Option<(Vec<u8>, usize)>,

    // Observations
    frames: Vec<Vec<u8>>,
    last_timeout: Option<Duration>,
    stop_calls: usize,
    deinit_calls: usize,
}

impl UltralightEmulator {
    /// Fresh tag: serial pages derived from `uid`, lock bytes and OTP clear
    pub fn new(uid: [u8; 7]) -> Self {
        let mut memory = [[0u8; PAGE_SIZE]; PAGES];
        let bcc0 = CT ^ uid[0] ^ uid[1] ^ uid[2];
        let bcc1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        memory[page::SERIAL_0 as usize] = [uid[0], uid[1], uid[2], bcc0];
        memory[page::SERIAL_1 as usize] = [uid[3], uid[4], uid[5], uid[6]];
        memory[page::LOCKS as usize] = [bcc1, INTERNAL, 0x00, 0x00];

        Self {
            memory,
            uid,
            sak: TagInfo::ULTRALIGHT_SAK,
            present: true,
            init_error: None,
            select_error: None,
            tx_error: None,
            read_len: None,
            reads_answered: None,
            ack_override: None,
            ignore_writes: false,
            mute_writes: false,
            powered: false,
            role: None,
            discovering: false,
            uid_filter: None,
            selected: false,
            pending: None,
            frames: Vec::new(),
            last_timeout: None,
            stop_calls: 0,
            deinit_calls: 0,
        }
    }

    /// Overwrite a page directly (no lock rules applied)
    pub fn with_page(mut self, page: u8, data: [u8; PAGE_SIZE]) -> Self {
        self.memory[page as usize % PAGES] = data;
        self
    }

    /// Set the whole lock page (page 2)
    pub fn with_lock_page(self, data: [u8; PAGE_SIZE]) -> Self {
        self.with_page(page::LOCKS, data)
    }

    pub fn with_sak(mut self, sak: u8) -> Self {
        self.sak = sak;
        self
    }

    /// Empty field: select reports `NoTag`
    pub fn without_tag(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn failing_init(mut self, error: RadioError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn failing_select(mut self, error: RadioError) -> Self {
        self.select_error = Some(error);
        self
    }

    pub fn failing_tx(mut self, error: RadioError) -> Self {
        self.tx_error = Some(error);
        self
    }

    /// Truncate READ responses to `len` bytes
    pub fn with_read_len(mut self, len: usize) -> Self {
        self.read_len = Some(len);
        self
    }

    /// Answer only the first `count` READs, then go silent
    pub fn answering_reads(mut self, count: usize) -> Self {
        self.reads_answered = Some(count);
        self
    }

    /// Answer every WRITE with `value` in a frame of `bits` bits
    pub fn with_ack(mut self, value: u8, bits: usize) -> Self {
        self.ack_override = Some((value, bits));
        self
    }

    /// ACK writes without committing them
    pub fn ignoring_writes(mut self) -> Self {
        self.ignore_writes = true;
        self
    }

    /// Never answer WRITE
    pub fn muting_writes(mut self) -> Self {
        self.mute_writes = true;
        self
    }

    pub fn page(&self, page: u8) -> [u8; PAGE_SIZE] {
        self.memory[page as usize % PAGES]
    }

    pub fn lock_page(&self) -> LockPage {
        LockPage::new(self.page(page::LOCKS))
    }

    /// Every frame transmitted, oldest first
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Transmitted WRITE frames only
    pub fn write_frames(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.frames
            .iter()
            .filter(|f| f.first() == Some(&Command::Write.opcode()))
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        self.last_timeout
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls
    }

    pub fn deinit_calls(&self) -> usize {
        self.deinit_calls
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Build the answer to one frame. `None` means the tag stays silent.
    fn respond(&mut self, frame: &[u8]) -> Option<(Vec<u8>, usize)> {
        match (frame.first().copied().and_then(Command::from_opcode), frame.len()) {
            (Some(Command::Read), 2) => self.respond_read(frame[1]),
            (Some(Command::Write), 6) if self.mute_writes => None,
            (Some(Command::Write), 6) => {
                let mut data = [0u8; PAGE_SIZE];
                data.copy_from_slice(&frame[2..6]);
                Some(self.respond_write(frame[1], data))
            }
            _ => None,
        }
    }

    fn respond_read(&mut self, addr: u8) -> Option<(Vec<u8>, usize)> {
        if let Some(remaining) = self.reads_answered.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        if addr >= page::COUNT {
            return Some(nak(ack::NAK_INVALID_ARGUMENT));
        }

        // Roll over past the last page
        let mut data: Vec<u8> = (0..PAGES_PER_READ)
            .flat_map(|i| self.memory[(addr as usize + i) % PAGES])
            .collect();
        if let Some(len) = self.read_len {
            data.truncate(len);
        }
        let bits = data.len() * 8;
        Some((data, bits))
    }

    fn respond_write(&mut self, addr: u8, data: [u8; PAGE_SIZE]) -> (Vec<u8>, usize) {
        if let Some((value, bits)) = self.ack_override {
            return (vec![value], bits);
        }

        let locks = self.lock_page();
        let accepted = match addr {
            page::SERIAL_0 | page::SERIAL_1 => false,
            page::LOCKS => true,
            page::OTP => !locks.is_otp_locked(),
            4..=15 => !locks.is_page_locked(addr),
            _ => false,
        };
        if !accepted {
            return nak(ack::NAK_INVALID_ARGUMENT);
        }

        if !self.ignore_writes {
            self.commit(addr, data, locks);
        }
        (vec![ack::ACK], ack::BITS)
    }

    fn commit(&mut self, addr: u8, data: [u8; PAGE_SIZE], locks: LockPage) {
        let slot = &mut self.memory[addr as usize];
        match addr {
            page::LOCKS => {
                // Bytes 0..1 are read-only; lock bits only ever get set, unless frozen
                let (frozen0, frozen1) = frozen_bits(locks);
                slot[2] |= data[2] & !frozen0.bits();
                slot[3] |= data[3] & !frozen1.bits();
            }
            page::OTP => {
                for (byte, new) in slot.iter_mut().zip(data) {
                    *byte |= new;
                }
            }
            _ => *slot = data,
        }
    }
}

impl Default for UltralightEmulator {
    fn default() -> Self {
        Self::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
    }
}

fn nak(value: u8) -> (Vec<u8>, usize) {
    (vec![value], ack::BITS)
}

/// Lock bits held in place by the block-lock bits
fn frozen_bits(locks: LockPage) -> (StaticLock0, StaticLock1) {
    let lock0 = locks.lock0();
    let mut frozen0 = StaticLock0::empty();
    let mut frozen1 = StaticLock1::empty();

    if lock0.contains(StaticLock0::BL_OTP) {
        frozen0 |= StaticLock0::L_OTP;
    }
    if lock0.contains(StaticLock0::BL_4_9) {
        frozen0 |= StaticLock0::L_4 | StaticLock0::L_5 | StaticLock0::L_6 | StaticLock0::L_7;
        frozen1 |= StaticLock1::L_8 | StaticLock1::L_9;
    }
    if lock0.contains(StaticLock0::BL_10_15) {
        frozen1 |= StaticLock1::L_10
            | StaticLock1::L_11
            | StaticLock1::L_12
            | StaticLock1::L_13
            | StaticLock1::L_14
            | StaticLock1::L_15;
    }

    (frozen0, frozen1)
}

impl RadioBackend for UltralightEmulator {
    fn init(&mut self) -> Result<(), RadioError> {
        if let Some(e) = self.init_error {
            return Err(e);
        }
        self.powered = true;
        Ok(())
    }

    fn set_role(&mut self, role: Role) -> Result<(), RadioError> {
        if !self.powered {
            return Err(RadioError::NotReady);
        }
        self.role = Some(role);
        Ok(())
    }

    fn start_discovery(
        &mut self,
        technology: Technology,
        uid_filter: Option<&[u8]>,
    ) -> Result<(), RadioError> {
        if !self.powered || self.role != Some(Role::Poller) {
            return Err(RadioError::NotReady);
        }
        self.discovering = technology.contains(Technology::ISO14443A);
        self.uid_filter = uid_filter.map(<[u8]>::to_vec);
        Ok(())
    }

    fn select(&mut self) -> Result<TagInfo, RadioError> {
        if !self.powered {
            return Err(RadioError::NotReady);
        }
        if let Some(e) = self.select_error {
            return Err(e);
        }
        let filtered_out = self
            .uid_filter
            .as_ref()
            .is_some_and(|prefix| !self.uid.starts_with(prefix));
        if !self.discovering || !self.present || filtered_out {
            return Err(RadioError::NoTag);
        }

        self.selected = true;
        Ok(TagInfo::new(&self.uid, ULTRALIGHT_ATQA, self.sak))
    }

    fn transmit_bits(&mut self, buf: &[u8], bits: usize) -> Result<(), RadioError> {
        if !self.selected {
            return Err(RadioError::NotReady);
        }
        if let Some(e) = self.tx_error {
            return Err(e);
        }
        if bits != buf.len() * 8 {
            // Only whole-byte standard frames are supported
            return Err(RadioError::TxRejected);
        }

        self.frames.push(buf.to_vec());
        self.pending = self.respond(buf);
        Ok(())
    }

    fn receive_bits(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RadioError> {
        self.last_timeout = Some(timeout);
        let (data, bits) = self.pending.take().ok_or(RadioError::Timeout)?;
        if data.len() > buf.len() {
            return Err(RadioError::BufferOverflow);
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(bits)
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        self.stop_calls += 1;
        self.discovering = false;
        self.selected = false;
        self.pending = None;
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), RadioError> {
        self.deinit_calls += 1;
        self.powered = false;
        self.role = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn selected(mut emu: UltralightEmulator) -> UltralightEmulator {
        emu.init().unwrap();
        emu.set_role(Role::Poller).unwrap();
        emu.start_discovery(Technology::ISO14443A, None).unwrap();
        emu.select().unwrap();
        emu
    }

    fn transceive(emu: &mut UltralightEmulator, frame: &[u8]) -> Result<(Vec<u8>, usize), RadioError> {
        emu.transmit_bits(frame, frame.len() * 8)?;
        let mut buf = [0u8; 16];
        let bits = emu.receive_bits(&mut buf, Duration::from_millis(500))?;
        Ok((buf[..bits.div_ceil(8)].to_vec(), bits))
    }

    #[test]
    fn test_serial_pages_and_bcc() {
        let emu = UltralightEmulator::new(hex!("04 11 22 33 44 55 66"));
        assert_eq!(emu.page(0), [0x04, 0x11, 0x22, 0x88 ^ 0x04 ^ 0x11 ^ 0x22]);
        assert_eq!(emu.page(1), hex!("33 44 55 66"));
        assert_eq!(emu.page(2), [0x33 ^ 0x44 ^ 0x55 ^ 0x66, 0x48, 0x00, 0x00]);
    }

    #[test]
    fn test_read_rolls_over() {
        let mut emu = selected(
            UltralightEmulator::default()
                .with_page(14, hex!("EE EE EE EE"))
                .with_page(15, hex!("FF FF FF FF")),
        );
        let (data, bits) = transceive(&mut emu, &[0x30, 14]).unwrap();
        assert_eq!(bits, 128);
        assert_eq!(&data[..8], &hex!("EE EE EE EE FF FF FF FF"));
        assert_eq!(&data[8..12], &emu.page(0));
    }

    #[test]
    fn test_read_out_of_range_naks() {
        let mut emu = selected(UltralightEmulator::default());
        assert_eq!(transceive(&mut emu, &[0x30, 0x10]).unwrap(), (vec![0x00], 4));
    }

    #[test]
    fn test_lock_bits_are_one_way() {
        let mut emu = selected(UltralightEmulator::default().with_lock_page(hex!("00 48 10 01")));
        let (ack, bits) = transceive(&mut emu, &hex!("A2 02 FF FF 08 00")).unwrap();
        assert_eq!((ack, bits), (vec![0x0A], 4));
        // Bytes 0..1 untouched, previously set bits survive
        assert_eq!(emu.page(2), hex!("00 48 18 01"));
    }

    #[test]
    fn test_block_lock_freezes_otp_bit() {
        let mut emu = selected(UltralightEmulator::default().with_lock_page(hex!("00 48 01 00")));
        transceive(&mut emu, &hex!("A2 02 00 48 09 00")).unwrap();
        assert!(!emu.lock_page().is_otp_locked());
    }

    #[test]
    fn test_otp_page_ors_and_locks() {
        let mut emu = selected(UltralightEmulator::default().with_page(3, hex!("01 00 00 00")));
        transceive(&mut emu, &hex!("A2 03 02 00 00 80")).unwrap();
        assert_eq!(emu.page(3), hex!("03 00 00 80"));

        transceive(&mut emu, &hex!("A2 02 00 00 08 00")).unwrap();
        let (nak, _) = transceive(&mut emu, &hex!("A2 03 FF FF FF FF")).unwrap();
        assert_eq!(nak, vec![0x00]);
        assert_eq!(emu.page(3), hex!("03 00 00 80"));
    }

    #[test]
    fn test_locked_user_page_naks() {
        let mut emu = selected(UltralightEmulator::default().with_lock_page(hex!("00 00 00 80")));
        let (nak, _) = transceive(&mut emu, &hex!("A2 0F 01 02 03 04")).unwrap();
        assert_eq!(nak, vec![0x00]);
        let (ack, _) = transceive(&mut emu, &hex!("A2 0E 01 02 03 04")).unwrap();
        assert_eq!(ack, vec![0x0A]);
        assert_eq!(emu.page(14), hex!("01 02 03 04"));
    }

    #[test]
    fn test_unknown_command_times_out() {
        let mut emu = selected(UltralightEmulator::default());
        assert_eq!(transceive(&mut emu, &[0x60]), Err(RadioError::Timeout));
    }

    #[test]
    fn test_small_receive_buffer_overflows() {
        let mut emu = selected(UltralightEmulator::default());
        emu.transmit_bits(&[0x30, 0x02], 16).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            emu.receive_bits(&mut buf, Duration::from_millis(1)),
            Err(RadioError::BufferOverflow)
        );
    }

    #[test]
    fn test_uid_filter() {
        let mut emu = UltralightEmulator::default();
        emu.init().unwrap();
        emu.set_role(Role::Poller).unwrap();
        emu.start_discovery(Technology::ISO14443A, Some(&[0x05][..])).unwrap();
        assert_eq!(emu.select(), Err(RadioError::NoTag));

        emu.start_discovery(Technology::ISO14443A, Some(&[0x04, 0x11][..])).unwrap();
        assert_eq!(emu.select().unwrap().uid(), &hex!("04 11 22 33 44 55 66"));
    }

    #[test]
    fn test_discovery_requires_poller_role() {
        let mut emu = UltralightEmulator::default();
        emu.init().unwrap();
        assert_eq!(
            emu.start_discovery(Technology::ISO14443A, None),
            Err(RadioError::NotReady)
        );
    }

    #[test]
    fn test_transmit_before_select_is_rejected() {
        let mut emu = UltralightEmulator::default();
        emu.init().unwrap();
        assert_eq!(emu.transmit_bits(&[0x30, 0x02], 16), Err(RadioError::NotReady));
    }
}
