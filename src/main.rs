//! qoobflash - Qoob Pro GameCube modchip flasher
//!
//! Reads, writes, erases, and verifies the 2 MiB BIOS flash of the Qoob Pro
//! over its USB HID bootloader interface. Every write is read back page by
//! page before the next one goes out; a half-flashed BIOS leaves the console
//! unbootable, so integrity failures abort loudly instead of being papered
//! over.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use qoobflash_core::Error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let device = cli.device;
    let retries = cli.retries;
    let result = match cli.command {
        Commands::Identify => commands::identify::run(device, retries),
        Commands::List => commands::list::run(device, retries),
        Commands::Read {
            output,
            start,
            length,
        } => commands::read::run(device, retries, &output, start, length),
        Commands::Write {
            input,
            start,
            no_verify,
        } => commands::write::run(device, retries, &input, start, !no_verify),
        Commands::Erase { start, length } => commands::erase::run(device, retries, start, length),
        Commands::Verify { input, start } => commands::verify::run(device, retries, &input, start),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Map errors to stable exit codes so scripts can tell apart "plug it in",
/// "fix the udev rule", and "the flash is bad".
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::DeviceNotFound => 2,
        Error::PermissionDenied => 3,
        Error::ProtocolMismatch(_)
        | Error::UnsupportedDevice { .. }
        | Error::Device { .. }
        | Error::RetryBudgetExceeded { .. } => 4,
        Error::VerifyMismatch { .. } | Error::BlankCheckFailed { .. } => 5,
        _ => 1,
    }
}
