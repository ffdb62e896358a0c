//! `sync_trigger`: frame rate of the sync master and trigger setup.

use anyhow::{Context, Result};
use ispflash_core::RegisterClient;
use ispflash_core::sync;

use super::Env;
use crate::bus;
use crate::cli::SyncArgs;

pub fn sync_trigger(env: &Env, args: &SyncArgs) -> Result<()> {
    let master = bus::open(&args.master.0, args.dry_run, &env.config)?;
    let master = RegisterClient::new(&master);

    let period = sync::set_frame_rate(&master, args.fps)?;
    println!("{:8X}", period);
    println!("{:3.2} fps ({:7.2} us)", args.fps, 1_000_000.0 / args.fps);

    if args.configure {
        sync::configure_master(&master).context("configuring sync master")?;
        let follower = bus::open(&args.follower.0, args.dry_run, &env.config)?;
        sync::configure_follower(&RegisterClient::new(&follower))
            .context("configuring sync follower")?;
    }
    Ok(())
}
