/// Protocol module - hardware-independent Ultralight command set
///
/// Defines frames, opcodes and the lock page layout without depending on any
/// specific radio backend.

pub mod commands;
pub mod lock;
pub mod transaction;
