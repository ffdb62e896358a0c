//! Register level commands: `status`, `readreg`, `writereg`, `reboot`,
//! `password`.

use anyhow::Result;
use ispflash_core::{CameraInfo, RegWidth, RegisterClient};
use tracing::info;

use super::Env;
use crate::bus;
use crate::cli::{BusArgs, PasswordArgs, ReadRegArgs, WriteRegArgs};

pub fn status(env: &Env, args: &BusArgs) -> Result<()> {
    let bus = bus::open(&args.bus.0, args.dry_run, &env.config)?;
    let info = CameraInfo::read(&RegisterClient::new(&bus))?;
    println!("{}", info);
    Ok(())
}

fn hex_digits(width: RegWidth) -> usize {
    width.bytes() * 2
}

pub fn read_reg(env: &Env, args: &ReadRegArgs) -> Result<()> {
    let bus = bus::open(&args.bus.bus.0, args.bus.dry_run, &env.config)?;
    let value = RegisterClient::new(&bus).read(args.width, args.reg)?;
    println!(
        "0x{:02X} = 0x{:0digits$X} ({})",
        args.reg,
        value,
        value,
        digits = hex_digits(args.width)
    );
    Ok(())
}

pub fn write_reg(env: &Env, args: &WriteRegArgs) -> Result<()> {
    let bus = bus::open(&args.bus.bus.0, args.bus.dry_run, &env.config)?;
    RegisterClient::new(&bus).write(args.width, args.reg, args.value)?;
    info!(
        reg = %format!("0x{:02X}", args.reg),
        value = %format!("0x{:0digits$X}", args.value, digits = hex_digits(args.width)),
        "Register written"
    );
    Ok(())
}

pub fn reboot(env: &Env, args: &BusArgs) -> Result<()> {
    let bus = bus::open(&args.bus.0, args.dry_run, &env.config)?;
    RegisterClient::new(&bus).restart()?;
    info!("Restart requested");
    Ok(())
}

pub fn password(env: &Env, args: &PasswordArgs) -> Result<()> {
    let bus = bus::open(&args.bus.bus.0, args.bus.dry_run, &env.config)?;
    RegisterClient::new(&bus).set_password(args.password)?;
    if args.password == 0 {
        info!("Password cleared");
    } else {
        info!("Password set");
    }
    Ok(())
}
