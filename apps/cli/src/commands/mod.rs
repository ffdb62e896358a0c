//! Subcommand implementations.

mod flash;
mod nvm;
mod register;
mod sync;

use anyhow::Result;
use ispflash_core::{CancelToken, UpdateConfig};

use crate::cli::Command;

/// State shared by every subcommand.
pub struct Env {
    pub config: UpdateConfig,
    pub cancel: CancelToken,
}

pub fn run(env: &Env, command: Command) -> Result<()> {
    match command {
        Command::FlashApp(args) => flash::flash_app(env, &args),
        Command::FlashIsp(args) => flash::flash_isp(env, &args),
        Command::FlashNvm(args) => nvm::flash_nvm(env, &args),
        Command::Status(args) => register::status(env, &args),
        Command::ReadReg(args) => register::read_reg(env, &args),
        Command::WriteReg(args) => register::write_reg(env, &args),
        Command::Reboot(args) => register::reboot(env, &args),
        Command::SyncTrigger(args) => sync::sync_trigger(env, &args),
        Command::Password(args) => register::password(env, &args),
    }
}
