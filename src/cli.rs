//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>()
            .map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "qoobflash")]
#[command(author, version, about = "Qoob Pro GameCube modchip flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Open the nth attached Qoob Pro (0-indexed)
    #[arg(long, default_value = "0", global = true)]
    pub device: usize,

    /// Attempts per command/page/sector before giving up
    #[arg(long, default_value = "3", global = true)]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show device identity and flash geometry
    Identify,

    /// List flash contents by scanning slot headers
    List,

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Flash address to start from (page-aligned, hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Bytes to read (defaults to the rest of flash)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Erase affected sectors, write file to flash, then verify
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Flash address to write at (sector-aligned, hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Skip the final verification pass
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase a range of sectors
    Erase {
        /// Flash address to start from (sector-aligned, hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Bytes to erase, rounded up to whole sectors (defaults to the rest
        /// of flash)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Compare flash contents against a file without writing
    Verify {
        /// File to compare against
        #[arg(short, long)]
        input: PathBuf,

        /// Flash address the file corresponds to (page-aligned)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,
    },
}
