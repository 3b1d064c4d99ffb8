//! Consumer-side measurement history.
//!
//! The listener hands measurements off on its worker thread; the host drains
//! them on its own thread into a [`MeasurementLog`], which timestamps each
//! reading on arrival and keeps the latest value plus an ordered history.
//!
//! Every change bumps a version number, so a UI can poll
//! [`MeasurementLog::snapshot`] and redraw only when the version moved.

use std::sync::mpsc;

use chrono::{DateTime, Local};
use hidkey_core::{Measurement, SessionId};

/// A measurement together with the time the consumer received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMeasurement {
    pub text: String,
    pub sequence: u64,
    pub session_id: SessionId,
    pub received_at: DateTime<Local>,
}

impl RecordedMeasurement {
    /// Receive time formatted for display, e.g. `14:03:27.512`.
    pub fn time_label(&self) -> String {
        self.received_at.format("%H:%M:%S%.3f").to_string()
    }
}

/// Point-in-time copy of a [`MeasurementLog`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub version: u64,
    pub latest: Option<RecordedMeasurement>,
    pub entries: Vec<RecordedMeasurement>,
}

/// Ordered history of received measurements.
#[derive(Debug, Default)]
pub struct MeasurementLog {
    version: u64,
    entries: Vec<RecordedMeasurement>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `measurement` stamped with the current local time.
    pub fn record(&mut self, measurement: Measurement) -> &RecordedMeasurement {
        self.record_at(measurement, Local::now())
    }

    /// Records `measurement` with an explicit receive time.
    pub fn record_at(
        &mut self,
        measurement: Measurement,
        received_at: DateTime<Local>,
    ) -> &RecordedMeasurement {
        self.version += 1;
        self.entries.push(RecordedMeasurement {
            text: measurement.text,
            sequence: measurement.sequence,
            session_id: measurement.session_id,
            received_at,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Records everything currently waiting on `rx` without blocking.
    ///
    /// Returns the number of measurements recorded.
    pub fn drain(&mut self, rx: &mpsc::Receiver<Measurement>) -> usize {
        let mut count = 0;
        for measurement in rx.try_iter() {
            self.record(measurement);
            count += 1;
        }
        count
    }

    /// The most recently recorded measurement.
    pub fn latest(&self) -> Option<&RecordedMeasurement> {
        self.entries.last()
    }

    /// All recorded measurements, oldest first.
    pub fn history(&self) -> &[RecordedMeasurement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Forgets the history.  Bumps the version only if something was removed.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.version += 1;
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            version: self.version,
            latest: self.latest().cloned(),
            entries: self.entries.clone(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn reading(text: &str, sequence: u64) -> Measurement {
        Measurement::new(text, sequence, Uuid::nil())
    }

    #[test]
    fn test_new_log_is_empty() {
        let log = MeasurementLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
        assert_eq!(log.version(), 0);
    }

    #[test]
    fn test_record_updates_latest_and_history() {
        // Arrange
        let mut log = MeasurementLog::new();

        // Act
        log.record(reading("12.5", 1));
        log.record(reading("13.0", 2));

        // Assert
        assert_eq!(log.latest().map(|m| m.text.as_str()), Some("13.0"));
        let texts: Vec<&str> = log.history().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["12.5", "13.0"]);
        assert_eq!(log.version(), 2);
    }

    #[test]
    fn test_record_at_keeps_given_timestamp() {
        let mut log = MeasurementLog::new();
        let at = Local
            .with_ymd_and_hms(2024, 3, 1, 14, 3, 27)
            .single()
            .expect("unambiguous local time");

        let recorded = log.record_at(reading("7", 1), at);

        assert_eq!(recorded.received_at, at);
        assert_eq!(recorded.time_label(), "14:03:27.000");
    }

    #[test]
    fn test_clear_bumps_version_only_when_non_empty() {
        let mut log = MeasurementLog::new();
        log.clear();
        assert_eq!(log.version(), 0);

        log.record(reading("1", 1));
        log.clear();

        assert!(log.is_empty());
        assert!(log.latest().is_none());
        assert_eq!(log.version(), 2);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let mut log = MeasurementLog::new();
        log.record(reading("1", 1));

        let snapshot = log.snapshot();
        log.record(reading("2", 2));

        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.latest.map(|m| m.text), Some("1".to_string()));
        assert_eq!(log.snapshot().version, 2);
    }

    #[test]
    fn test_drain_records_everything_queued() {
        let (tx, rx) = mpsc::channel();
        tx.send(reading("1", 1)).unwrap();
        tx.send(reading("2", 2)).unwrap();
        let mut log = MeasurementLog::new();

        assert_eq!(log.drain(&rx), 2);
        assert_eq!(log.drain(&rx), 0);
        assert_eq!(log.len(), 2);
    }
}
