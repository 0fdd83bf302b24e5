use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use libultralight::{Config, LockOutcome, LockPage, OtpLocker, UltralightEmulator};

/// Lock the OTP page of a MIFARE Ultralight tag
///
/// Runs against an emulated tag; the flags below shape what that tag looks
/// like and how it misbehaves.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: log::Level,

    #[command(flatten)]
    tag: TagArgs,
}

#[derive(Subcommand)]
enum Cmd {
    /// Set the OTP lock bit and verify it
    Lock,
    /// Print the lock page without writing
    Status,
}

#[derive(Args)]
struct TagArgs {
    /// Initial lock page (page 2), 4 bytes hex
    #[arg(long, value_parser = parse_hex::<4>, default_value = "00480000")]
    lock_page: [u8; 4],

    /// 7-byte UID, hex
    #[arg(long, value_parser = parse_hex::<7>, default_value = "04112233445566")]
    uid: [u8; 7],

    /// Leave the field empty
    #[arg(long)]
    no_tag: bool,

    /// NAK every WRITE
    #[arg(long)]
    nak: bool,

    /// ACK writes without storing them
    #[arg(long)]
    ignore_writes: bool,
}

impl TagArgs {
    fn emulator(&self) -> UltralightEmulator {
        let mut emu = UltralightEmulator::new(self.uid).with_lock_page(self.lock_page);
        if self.no_tag {
            emu = emu.without_tag();
        }
        if self.nak {
            emu = emu.with_ack(0x00, 4);
        }
        if self.ignore_writes {
            emu = emu.ignoring_writes();
        }
        emu
    }
}

fn parse_hex<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s.trim(), &mut out).map_err(|e| format!("expected {N} hex bytes: {e}"))?;
    Ok(out)
}

fn describe(lock_page: &LockPage) -> String {
    let locked: Vec<String> = lock_page.locked_pages().map(|p| p.to_string()).collect();
    format!(
        "{} (OTP {}, locked pages: [{}])",
        hex::encode_upper(lock_page.bytes()),
        if lock_page.is_otp_locked() { "locked" } else { "unlocked" },
        locked.join(", ")
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(cli.log_level)?;

    let config = Config {
        rx_timeout: Duration::from_millis(cli.timeout_ms),
    };
    let mut emu = cli.tag.emulator();
    let mut locker = OtpLocker::with_config(&mut emu, config);

    match cli.command {
        Cmd::Status => {
            let lock_page = locker.read_lock_page().context("Reading lock page")?;
            println!("Lock page: {}", describe(&lock_page));
        }
        Cmd::Lock => {
            let outcome = locker.lock_otp().context("Locking OTP page")?;
            match outcome {
                LockOutcome::Locked { lock_page } => {
                    println!("OTP page locked, lock page now {}", describe(&lock_page));
                }
                LockOutcome::AlreadyLocked { lock_page } => {
                    println!("OTP page was already locked: {}", describe(&lock_page));
                }
                LockOutcome::VerifyMismatch { written, read_back } => {
                    println!(
                        "Write acknowledged but not applied: wrote {}, read back {}",
                        hex::encode_upper(written.bytes()),
                        describe(&read_back)
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex::<4>("000008FF"), Ok([0x00, 0x00, 0x08, 0xFF]));
        assert!(parse_hex::<4>("0000").is_err());
        assert!(parse_hex::<4>("zz000000").is_err());
    }

    #[test]
    fn test_cli_locks_emulated_tag() {
        let cli = Cli::try_parse_from(["ulotp_cli", "--lock-page", "000000FF", "lock"]).unwrap();
        let mut emu = cli.tag.emulator();
        let outcome = OtpLocker::new(&mut emu).lock_otp().unwrap();
        assert!(outcome.is_locked());
        assert_eq!(emu.lock_page().bytes(), [0x00, 0x00, 0x08, 0xFF]);
    }

    #[test]
    fn test_cli_nak_flag() {
        let cli = Cli::try_parse_from(["ulotp_cli", "--nak", "lock"]).unwrap();
        let mut emu = cli.tag.emulator();
        assert!(OtpLocker::new(&mut emu).lock_otp().is_err());
    }

    #[test]
    fn test_describe() {
        let lock_page = LockPage::new([0x00, 0x48, 0x18, 0x80]);
        assert_eq!(
            describe(&lock_page),
            "00481880 (OTP locked, locked pages: [3, 4, 15])"
        );
    }
}
