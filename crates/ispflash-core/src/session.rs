//! Update session - high-level orchestrator for one update pass.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cancel::CancelToken;
use crate::device::{FlashProtocol, PollOutcome, PollPolicy};
use crate::error::UpdateError;
use crate::events::{LogLevel, TracingObserver, UpdateEvent, UpdateObserver, UpdatePhase};
use crate::payload::{FirmwareImage, Region};
use crate::protocol::constants::{DEFAULT_I2C_ADDRESS, FLASH_PAGE_SIZE};
use crate::state::handlers::{
    HandlerContext, authenticate, check_identity, enter_update_mode, erase_scope, finalize,
    program, verify,
};
use crate::state::{PhaseTracker, VerifyReport};
use crate::transport::RetryPolicy;

/// Timing and bus parameters of an update pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// 7-bit I2C address of the camera.
    pub bus_address: u16,
    /// Retry applied to every bus transaction.
    pub retry: RetryPolicy,
    /// Status polling after erase commands.
    pub erase_poll: PollPolicy,
    /// Status polling after each written block.
    pub program_poll: PollPolicy,
    /// Liveness polling while the device computes its CRC.
    pub crc_poll: PollPolicy,
    /// Liveness polling after mode entry.
    pub liveness_poll: PollPolicy,
    pub auth_settle_ms: u64,
    pub mode_settle_ms: u64,
    pub reboot_settle_ms: u64,
    /// Largest single erase request in bytes.
    pub max_page_size: u32,
    /// Abort when the flash part reports an unexpected identity.
    pub check_identity: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            bus_address: DEFAULT_I2C_ADDRESS,
            retry: RetryPolicy::default(),
            erase_poll: PollPolicy::new(10, 10_000),
            program_poll: PollPolicy::new(1, 1_000),
            crc_poll: PollPolicy::new(10, 1_000),
            liveness_poll: PollPolicy::new(10, 3_000),
            auth_settle_ms: 1_000,
            mode_settle_ms: 1_000,
            reboot_settle_ms: 1_000,
            max_page_size: FLASH_PAGE_SIZE,
            check_identity: true,
        }
    }
}

impl UpdateConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: UpdateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Update session - runs one erase/program/verify pass against a device.
///
/// A session is single-use: once it reaches `Success` or `Failed` a second
/// `run` fails with `InvalidTransition`.
pub struct UpdateSession<O: UpdateObserver> {
    config: UpdateConfig,
    observer: Arc<O>,
    image: FirmwareImage,
    region: Region,
    password: Option<u16>,
    cancel: CancelToken,
    phases: PhaseTracker,
}

impl UpdateSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: UpdateConfig, image: FirmwareImage, region: Region) -> Self {
        Self::with_observer(config, image, region, Arc::new(TracingObserver))
    }
}

impl<O: UpdateObserver> UpdateSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(
        config: UpdateConfig,
        image: FirmwareImage,
        region: Region,
        observer: Arc<O>,
    ) -> Self {
        Self {
            config,
            observer,
            image,
            region,
            password: None,
            cancel: CancelToken::new(),
            phases: PhaseTracker::new(),
        }
    }

    pub fn with_password(mut self, password: Option<u16>) -> Self {
        self.password = password;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phases.phase()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    /// Run the complete update pass.
    ///
    /// Returns the verification report on success. A CRC mismatch is
    /// reported as `VerificationMismatch` after the password is cleared
    /// (targets that only drop it on reboot keep it latched); the device is
    /// not rebooted in that case.
    #[instrument(skip_all, fields(target_name = protocol.name(), region = %self.region))]
    pub fn run<P: FlashProtocol>(&mut self, protocol: &P) -> Result<VerifyReport, UpdateError> {
        let result = self.run_phases(protocol);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    fn run_phases<P: FlashProtocol>(&mut self, protocol: &P) -> Result<VerifyReport, UpdateError> {
        let Self {
            config,
            observer,
            image,
            region,
            password,
            cancel,
            phases,
        } = self;
        let (config, image, cancel) = (&*config, &*image, &*cancel);
        let observer = observer.as_ref();
        let region = *region;

        if phases.phase() != UpdatePhase::Idle {
            return Err(UpdateError::InvalidTransition {
                from: phases.phase(),
                to: UpdatePhase::ModeEntry,
            });
        }

        if region.select(image).is_empty() {
            return Err(UpdateError::InvalidRegion(format!(
                "image has no data in region {}",
                region
            )));
        }

        let ctx = HandlerContext {
            protocol,
            observer,
            config,
            cancel,
        };

        if let Some(password) = *password {
            transition(phases, observer, UpdatePhase::Authenticating)?;
            authenticate(&ctx, password)?;
        } else if region.requires_password() {
            ctx.log(
                LogLevel::Warn,
                format!("No password given; {} may be write-protected", region),
            );
        }

        transition(phases, observer, UpdatePhase::ModeEntry)?;
        enter_update_mode(&ctx)?;
        if config.check_identity {
            check_identity(&ctx)?;
        }

        transition(phases, observer, UpdatePhase::Erasing)?;
        if let PollOutcome::TimedOut { polls } = ctx.wait_idle(&config.erase_poll)? {
            return Err(UpdateError::EraseTimeout { polls });
        }
        erase_scope(&ctx, region)?;

        transition(phases, observer, UpdatePhase::Programming)?;
        let summary = program(&ctx, image, region)?;
        info!(blocks = summary.blocks, bytes = summary.bytes, "Programming done");

        transition(phases, observer, UpdatePhase::Verifying)?;
        let report = verify(&ctx, image, region)?;

        transition(phases, observer, UpdatePhase::Finalizing)?;
        finalize(&ctx, report.matches())?;

        if !report.matches() {
            return Err(UpdateError::VerificationMismatch {
                local: report.local,
                device: report.device,
            });
        }

        transition(phases, observer, UpdatePhase::Success)?;
        observer.on_event(&UpdateEvent::Complete);
        Ok(report)
    }

    fn fail(&mut self, err: &UpdateError) {
        let phase = self.phases.phase();
        if phase == UpdatePhase::Programming {
            warn!("Device left partially programmed; rerun the update");
            self.observer.on_event(&UpdateEvent::Log {
                level: LogLevel::Warn,
                message: "Device is partially programmed".into(),
            });
        }
        self.observer.on_event(&UpdateEvent::Error {
            message: err.to_string(),
        });
        if !phase.is_terminal() {
            // Every non-terminal phase may fail.
            let _ = transition(&mut self.phases, self.observer.as_ref(), UpdatePhase::Failed);
        }
    }
}

fn transition<O: UpdateObserver>(
    phases: &mut PhaseTracker,
    observer: &O,
    to: UpdatePhase,
) -> Result<(), UpdateError> {
    let from = phases.goto(to)?;
    observer.on_event(&UpdateEvent::PhaseChanged { from, to });
    Ok(())
}
