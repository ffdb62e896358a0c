use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ispflash_core::payload::{ImageMetadata, ImageRecord};
use ispflash_core::protocol::constants::{FLASH_APP_START, MAX_BLOCK_SIZE};
use ispflash_core::FirmwareImage;
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run the workspace tests
    Test,
    /// Write a synthetic image file for bench testing
    GenImage {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// First address (hex)
        #[arg(long, default_value = "1A00", value_parser = parse_hex)]
        start: u32,
        /// Payload size in bytes (hex)
        #[arg(long, default_value = "30", value_parser = parse_hex)]
        size: u32,
        /// Bytes per block
        #[arg(long, default_value_t = 16)]
        block: usize,
    },
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex '{}': {}", s, e))
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {} failed", args.join(" "));
    }
    Ok(())
}

fn gen_image(out: &PathBuf, start: u32, size: u32, block: usize) -> Result<()> {
    if block == 0 || block > MAX_BLOCK_SIZE {
        anyhow::bail!("block size must be 1..={}", MAX_BLOCK_SIZE);
    }
    let payload: Vec<u8> = (0..size).map(|i| (i & 0xFF) as u8).collect();
    let records = payload
        .chunks(block)
        .enumerate()
        .map(|(i, chunk)| ImageRecord::new(start + (i * block) as u32, chunk.to_vec()))
        .collect();

    let image = FirmwareImage::from_records(records)?;
    let metadata = ImageMetadata {
        crc: Some(image.crc()),
        size: Some(image.total_size()),
    };
    let image = image.with_metadata(metadata);
    image
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Wrote {} ({} blocks, {} bytes, CRC 0x{:04X})",
        out.display(),
        image.len(),
        image.total_size(),
        image.crc()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"])?;
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"])?;
        }
        Commands::GenImage {
            out,
            start,
            size,
            block,
        } => {
            if *start < FLASH_APP_START {
                println!("Note: 0x{:04X} is below the application area", start);
            }
            gen_image(out, *start, *size, *block)?;
        }
    }

    Ok(())
}
