//! Transport layer module.

pub mod dry_run;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod mock;
pub mod retry;
#[cfg(test)]
pub(crate) mod sim;
pub mod traits;

pub use dry_run::DryRunTransport;
#[cfg(target_os = "linux")]
pub use linux::LinuxI2c;
pub use mock::{MockTransport, Transaction};
pub use retry::{Exhausted, RetryPolicy, RetryingTransport, Transient, retry};
pub use traits::{I2cTransport, TransportError, expect_len, hex_bytes};
