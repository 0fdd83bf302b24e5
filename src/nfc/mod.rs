pub mod backend;
pub mod otp_lock;
pub mod protocol;
pub mod session;
pub mod transport;

/// `log` target for everything this crate emits
pub const LOG_TARGET: &str = "ulotp";
