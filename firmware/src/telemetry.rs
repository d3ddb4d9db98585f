//! Mirrors accessory telemetry to defmt on the MCU and stdout on host builds.

use accessory_core::telemetry::{EventId, Severity, TelemetryRecord, TelemetryRecorder};

use crate::clock::FirmwareInstant;

/// Tracks which telemetry records were already logged.
#[derive(Debug, Default)]
pub struct TelemetryLog {
    cursor: Option<EventId>,
}

impl TelemetryLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { cursor: None }
    }

    /// Emits every record newer than the last flush; returns how many.
    pub fn flush<const CAP: usize>(
        &mut self,
        recorder: &TelemetryRecorder<FirmwareInstant, CAP>,
    ) -> usize {
        let mut emitted = 0;
        for record in recorder.records_after(self.cursor) {
            emit_record(record);
            self.cursor = Some(record.id);
            emitted += 1;
        }
        emitted
    }

    #[must_use]
    pub const fn cursor(&self) -> Option<EventId> {
        self.cursor
    }
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    let id = record.id;
    let timestamp_us = record.timestamp.as_micros();
    let event = defmt::Display2Format(&record.event);
    match record.event.severity() {
        Severity::Debug => defmt::debug!("telemetry#{} t={}us {}", id, timestamp_us, event),
        Severity::Info => defmt::info!("telemetry#{} t={}us {}", id, timestamp_us, event),
        Severity::Warn => defmt::warn!("telemetry#{} t={}us {}", id, timestamp_us, event),
        Severity::Error => defmt::error!("telemetry#{} t={}us {}", id, timestamp_us, event),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    println!(
        "telemetry#{} [{}] t={}us {}",
        record.id,
        severity_label(record.event.severity()),
        record.timestamp.as_micros(),
        record.event
    );
}

#[cfg(not(target_os = "none"))]
const fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error => "error",
    }
}
