//! Terminal progress output for update sessions.

use std::io::{self, Write};
use std::sync::Mutex;

use ispflash_core::events::{TracingObserver, UpdateEvent, UpdateObserver, UpdatePhase};

/// Draws a single progress line on stderr and forwards everything else to
/// the tracing log.
#[derive(Default)]
pub struct ProgressObserver {
    last: Mutex<Option<(UpdatePhase, u8)>>,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(&self, phase: UpdatePhase, address: u32, percent: u8) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if *last == Some((phase, percent)) {
            return;
        }
        *last = Some((phase, percent));
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{:<12} 0x{:04X} {:3}%", phase.to_string(), address, percent);
        if percent >= 100 {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}

impl UpdateObserver for ProgressObserver {
    fn on_event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::Progress {
                phase,
                address,
                percent,
            } => self.draw(*phase, *address, *percent),
            UpdateEvent::CrcReport { local, device } => {
                eprintln!("CRC local 0x{:04X}, device 0x{:04X}", local, device);
                TracingObserver.on_event(event);
            }
            _ => TracingObserver.on_event(event),
        }
    }
}
