//! Command line definition.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use ispflash_core::RegWidth;
use ispflash_core::protocol::constants::{CSI0_I2C_PATH, CSI1_I2C_PATH};

#[derive(Parser, Debug)]
#[command(name = "ispflash", version, about = "Firmware and NVM update tool for I2C camera modules")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with bus, retry and timing settings
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update the MCU application and/or NVM through the bootloader
    #[command(name = "flashapp")]
    FlashApp(FlashAppArgs),
    /// Update the ISP SPI flash
    #[command(name = "flashisp")]
    FlashIsp(FlashIspArgs),
    /// Read, dump or write the NVM pages
    #[command(name = "flashnvm")]
    FlashNvm(FlashNvmArgs),
    /// Show versions, state and temperatures
    Status(BusArgs),
    /// Read a register
    #[command(name = "readreg")]
    ReadReg(ReadRegArgs),
    /// Write a register
    #[command(name = "writereg")]
    WriteReg(WriteRegArgs),
    /// Restart the camera application
    Reboot(BusArgs),
    /// Set the sync frame rate and optionally configure triggering
    #[command(name = "sync_trigger", alias = "sync-trigger")]
    SyncTrigger(SyncArgs),
    /// Set or clear (0) the password
    Password(PasswordArgs),
}

/// I2C bus selector: `0`, `1` or a device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusArg(pub PathBuf);

impl FromStr for BusArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(BusArg(PathBuf::from(CSI0_I2C_PATH))),
            "1" => Ok(BusArg(PathBuf::from(CSI1_I2C_PATH))),
            _ if s.chars().all(|c| c.is_ascii_digit()) => {
                Err(format!("wrong i2c bus {}, expected 0, 1 or a device path", s))
            }
            _ => Ok(BusArg(PathBuf::from(s))),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BusArgs {
    /// I2C bus: 0, 1 or a device path
    #[arg(short = 'i', long = "iic", default_value = "0")]
    pub bus: BusArg,

    /// Dummy I2C transfers (log only)
    #[arg(short = 'D', long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MultiBusArgs {
    /// I2C bus: 0, 1 or a device path; repeat to update several cameras
    #[arg(short = 'i', long = "iic", default_value = "0")]
    pub buses: Vec<BusArg>,

    /// Dummy I2C transfers (log only)
    #[arg(short = 'D', long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct FlashAppArgs {
    /// Image file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Update password
    #[arg(short = 'p', long, value_parser = parse_u16)]
    pub password: Option<u16>,

    /// Write the application area only
    #[arg(short = 'a', long = "app", conflicts_with_all = ["nvm", "nvm_block"])]
    pub app: bool,

    /// Write the NVM area only
    #[arg(short = 'n', long = "nvm", conflicts_with = "nvm_block")]
    pub nvm: bool,

    /// Write a single NVM page (0..=3)
    #[arg(long = "nvm-block")]
    pub nvm_block: Option<u8>,

    #[command(flatten)]
    pub bus: MultiBusArgs,
}

#[derive(Args, Debug)]
pub struct FlashIspArgs {
    /// Image file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Update password
    #[arg(short = 'p', long, value_parser = parse_u16)]
    pub password: Option<u16>,

    #[command(flatten)]
    pub bus: MultiBusArgs,
}

#[derive(Args, Debug)]
pub struct FlashNvmArgs {
    /// Dump file (read) or image file (write); prints to stdout when omitted
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Write the file to the NVM instead of reading
    #[arg(short = 'w', long = "write", requires = "file")]
    pub write: bool,

    /// Only write this page: 0=user reg, 1=user cal, 2=factory reg, 3=factory cal
    #[arg(short = 'n', long = "block")]
    pub block: Option<u8>,

    /// Password for the factory pages
    #[arg(short = 'p', long, value_parser = parse_u16)]
    pub password: Option<u16>,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct ReadRegArgs {
    /// Register address
    #[arg(value_parser = parse_u8)]
    pub reg: u8,

    /// Register width in bits
    #[arg(short = 'w', long = "width", default_value = "8", value_parser = parse_width)]
    pub width: RegWidth,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct WriteRegArgs {
    /// Register address
    #[arg(value_parser = parse_u8)]
    pub reg: u8,

    /// Value to write
    #[arg(value_parser = parse_u32)]
    pub value: u32,

    /// Register width in bits
    #[arg(short = 'w', long = "width", default_value = "8", value_parser = parse_width)]
    pub width: RegWidth,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Frame rate in frames per second
    #[arg(short = 'f', long = "fps")]
    pub fps: f64,

    /// Also configure sync output and trigger mode on both cameras
    #[arg(short = 'c', long = "configure")]
    pub configure: bool,

    /// Bus of the camera generating the sync signal
    #[arg(long = "master", default_value = "0")]
    pub master: BusArg,

    /// Bus of the camera following the sync signal
    #[arg(long = "follower", default_value = "1")]
    pub follower: BusArg,

    /// Dummy I2C transfers (log only)
    #[arg(short = 'D', long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Password, 0 clears it
    #[arg(short = 'p', long, value_parser = parse_u16, default_value = "0")]
    pub password: u16,

    #[command(flatten)]
    pub bus: BusArgs,
}

/// Parse decimal or `0x`-prefixed hex.
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_u32(s)?;
    u16::try_from(value).map_err(|_| format!("{} does not fit in 16 bits", s))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_u32(s)?;
    u8::try_from(value).map_err(|_| format!("{} does not fit in 8 bits", s))
}

fn parse_width(s: &str) -> Result<RegWidth, String> {
    let bits = parse_u8(s)?;
    RegWidth::from_bits(bits).ok_or_else(|| format!("width must be 8, 16 or 32, got {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bus_selection() {
        assert_eq!("0".parse::<BusArg>().unwrap().0, PathBuf::from(CSI0_I2C_PATH));
        assert_eq!("1".parse::<BusArg>().unwrap().0, PathBuf::from(CSI1_I2C_PATH));
        assert_eq!(
            "/dev/i2c-3".parse::<BusArg>().unwrap().0,
            PathBuf::from("/dev/i2c-3")
        );
        assert!("2".parse::<BusArg>().is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_u32("0x1A00").unwrap(), 0x1A00);
        assert_eq!(parse_u32("42").unwrap(), 42);
        assert!(parse_u16("0x10000").is_err());
        assert!(parse_width("12").is_err());
    }

    #[test]
    fn test_flashisp_multiple_buses() {
        let cli = Cli::try_parse_from([
            "ispflash", "flashisp", "-f", "isp.img", "-p", "0x1234", "-i", "0", "-i", "1",
        ])
        .unwrap();
        let Command::FlashIsp(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.password, Some(0x1234));
        assert_eq!(args.bus.buses.len(), 2);
    }

    #[test]
    fn test_flashapp_region_flags_conflict() {
        assert!(Cli::try_parse_from(["ispflash", "flashapp", "-f", "a.img", "-a", "-n"]).is_err());
    }
}
