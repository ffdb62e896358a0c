//! `flashnvm`: read, dump or write the NVM pages.

use std::io;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use ispflash_core::nvm::{self, NvmContents};
use ispflash_core::payload::NvmBlock;
use ispflash_core::{FirmwareImage, RegisterClient};
use tracing::info;

use super::Env;
use crate::bus::{self, Bus};
use crate::cli::FlashNvmArgs;

/// Pause after a password write before NVM access.
const PASSWORD_SETTLE: Duration = Duration::from_millis(100);

pub fn flash_nvm(env: &Env, args: &FlashNvmArgs) -> Result<()> {
    let block = args.block.map(NvmBlock::try_from).transpose()?;
    // Parse before the bus is touched.
    let image = match (&args.file, args.write) {
        (Some(path), true) => Some(
            FirmwareImage::load(path)
                .with_context(|| format!("loading NVM dump {}", path.display()))?,
        ),
        (None, true) => anyhow::bail!("--write needs a dump file"),
        _ => None,
    };

    let bus = bus::open(&args.bus.bus.0, args.bus.dry_run, &env.config)?;
    let regs = RegisterClient::new(&bus);

    let password = args.password.filter(|&p| p > 0);
    if let Some(password) = password {
        regs.set_password(password)?;
        thread::sleep(PASSWORD_SETTLE);
    }

    let result = match &image {
        Some(image) => write(env, &regs, image, block),
        None => read(&regs, args),
    };

    if password.is_some() {
        regs.set_password(0)?;
    }
    result?;
    println!("Done");
    Ok(())
}

fn write(
    env: &Env,
    regs: &RegisterClient<&Bus>,
    image: &FirmwareImage,
    block: Option<NvmBlock>,
) -> Result<()> {
    let written = nvm::write_dump(regs, image, block, &env.cancel)?;
    info!(bytes = written, "NVM write finished");
    Ok(())
}

fn read(regs: &RegisterClient<&Bus>, args: &FlashNvmArgs) -> Result<()> {
    let contents = NvmContents::read(regs)?;
    match &args.file {
        Some(path) => {
            contents
                .save_dump(path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(file = %path.display(), "NVM dump saved");
        }
        None => contents.print(io::stdout().lock())?,
    }
    Ok(())
}
