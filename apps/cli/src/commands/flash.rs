//! `flashapp` and `flashisp`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ispflash_core::payload::NvmBlock;
use ispflash_core::{
    CrcReference, FirmwareImage, IspUpgrader, McuBootloader, Region, UpdateError, UpdateSession,
    VerifyReport,
};
use tracing::{info, warn};

use super::Env;
use crate::bus;
use crate::cli::{FlashAppArgs, FlashIspArgs, MultiBusArgs};
use crate::progress::ProgressObserver;

#[derive(Debug, Clone, Copy)]
enum Target {
    Bootloader,
    Upgrader,
}

pub fn flash_app(env: &Env, args: &FlashAppArgs) -> Result<()> {
    let mut image = load_image(&args.file)?;
    if image.is_nvm_dump() {
        info!("Image is an NVM dump, mapping pages onto the NVM flash window");
        image = image
            .relocate_nvm_dump()
            .context("relocating NVM dump")?;
    }

    let region = if args.app {
        Region::App
    } else if args.nvm {
        Region::Nvm
    } else if let Some(index) = args.nvm_block {
        Region::NvmBlock(NvmBlock::try_from(index)?)
    } else {
        Region::All
    };

    update_all(env, &args.bus, Target::Bootloader, &image, region, args.password)
}

pub fn flash_isp(env: &Env, args: &FlashIspArgs) -> Result<()> {
    let image = load_image(&args.file)?;
    update_all(env, &args.bus, Target::Upgrader, &image, Region::All, args.password)
}

fn load_image(path: &Path) -> Result<FirmwareImage> {
    let image = FirmwareImage::load(path)
        .with_context(|| format!("loading image {}", path.display()))?;
    info!(
        file = %path.display(),
        blocks = image.len(),
        bytes = image.total_size(),
        crc = %format!("0x{:04X}", image.crc()),
        "Image loaded"
    );
    Ok(image)
}

/// Update every selected camera in turn, stopping at the first failure.
fn update_all(
    env: &Env,
    buses: &MultiBusArgs,
    target: Target,
    image: &FirmwareImage,
    region: Region,
    password: Option<u16>,
) -> Result<()> {
    if region.requires_password() && password.is_none() {
        warn!(%region, "No password given, the device may refuse the update");
    }

    let mut config = env.config.clone();
    if buses.dry_run {
        config.check_identity = false;
    }

    for bus_arg in &buses.buses {
        let path = &bus_arg.0;
        let bus = bus::open(path, buses.dry_run, &config)?;
        let mut session = UpdateSession::with_observer(
            config.clone(),
            image.clone(),
            region,
            Arc::new(ProgressObserver::new()),
        )
        .with_password(password)
        .with_cancel(env.cancel.clone());

        let result = match target {
            Target::Bootloader => session.run(&McuBootloader::new(&bus)),
            Target::Upgrader => session.run(&IspUpgrader::new(&bus)),
        };
        report(result, buses.dry_run)
            .with_context(|| format!("updating camera on {}", path.display()))?;
    }
    Ok(())
}

fn report(result: Result<VerifyReport, UpdateError>, dry_run: bool) -> Result<()> {
    match result {
        Ok(report) => {
            println!("Programming was successful!");
            let source = match report.reference {
                CrcReference::Image => "image",
                CrcReference::Stored => "stored",
            };
            println!(
                "CRC 0x{:04X} ({}) over 0x{:04X}..0x{:04X}",
                report.local, source, report.start, report.end
            );
            Ok(())
        }
        // Dry-run reads return zeros, so the device CRC never matches.
        Err(UpdateError::VerificationMismatch { local, device }) if dry_run => {
            info!(
                local = %format!("0x{:04X}", local),
                device = %format!("0x{:04X}", device),
                "Dry run finished"
            );
            Ok(())
        }
        Err(err @ UpdateError::VerificationMismatch { .. }) => {
            println!("Programming failed!");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
