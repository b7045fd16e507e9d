//! Measurement ledger
//!
//! Ordered record of computed measurements. Entries keep their identity and
//! position when replaced, so the host can re-measure an element after its
//! geometry changes without reshuffling reports.

use crate::error::{MeasureError, MeasureResult};
use crate::measurement::{Measurement, MeasurementKind};
use std::collections::BTreeMap;
use std::fmt;

/// Monotonic ledger entry identity
///
/// Ordered by timestamp, then by insertion sequence to break ties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct EntryId {
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
    pub seq: u64,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp_ms, self.seq)
    }
}

/// A measurement and its ledger identity
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub measurement: Measurement,
}

/// Flat row handed to report exporters
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportRow {
    /// 1-based position in the ledger
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub value: f64,
    pub unit: String,
    pub extra: String,
    /// Entry timestamp, Unix milliseconds
    pub timestamp: i64,
}

/// Per-kind summary for report footers
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KindTotal {
    pub kind: MeasurementKind,
    pub unit: String,
    pub count: usize,
    /// Sum of primary values; `None` where a sum is meaningless (angles, slopes)
    pub total: Option<f64>,
}

/// Append/update collection of measurements
#[derive(Debug, Clone)]
pub struct MeasurementLedger {
    entries: Vec<LedgerEntry>,
    next_seq: u64,
    last_timestamp: i64,
    clock: fn() -> i64,
}

impl Default for MeasurementLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementLedger {
    pub fn new() -> Self {
        Self::with_clock(crate::unix_millis)
    }

    /// Ledger stamping entries with a custom millisecond clock
    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
            last_timestamp: i64::MIN,
            clock,
        }
    }

    fn next_id(&mut self) -> EntryId {
        // Never step backwards, even if the wall clock does
        let timestamp_ms = (self.clock)().max(self.last_timestamp);
        self.last_timestamp = timestamp_ms;
        let seq = self.next_seq;
        self.next_seq += 1;
        EntryId { timestamp_ms, seq }
    }

    /// Append a measurement and return its identity
    pub fn append(&mut self, measurement: Measurement) -> EntryId {
        let id = self.next_id();
        tracing::debug!(%id, kind = %measurement.kind(), "measurement appended");
        self.entries.push(LedgerEntry { id, measurement });
        id
    }

    /// Replace an entry wholesale, keeping its id and position
    pub fn update(&mut self, id: EntryId, recomputed: Measurement) -> MeasureResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(MeasureError::EntryNotFound(id))?;
        tracing::debug!(%id, kind = %recomputed.kind(), "measurement updated");
        entry.measurement = recomputed;
        Ok(())
    }

    /// Remove a single entry
    pub fn remove(&mut self, id: EntryId) -> Option<Measurement> {
        let position = self.entries.iter().position(|e| e.id == id)?;
        tracing::debug!(%id, "measurement removed");
        Some(self.entries.remove(position).measurement)
    }

    pub fn get(&self, id: EntryId) -> Option<&Measurement> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.measurement)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `limit` entries, newest first
    pub fn history(&self, limit: usize) -> Vec<&LedgerEntry> {
        self.entries.iter().rev().take(limit).collect()
    }

    /// Remove every entry
    ///
    /// Identities keep increasing afterwards.
    pub fn clear(&mut self) {
        tracing::debug!(count = self.entries.len(), "ledger cleared");
        self.entries.clear();
    }

    /// Flat projection for reporting
    pub fn export_rows(&self, precision: usize) -> Vec<ExportRow> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ExportRow {
                index: i + 1,
                kind: entry.measurement.kind(),
                value: entry.measurement.primary_value(),
                unit: entry.measurement.unit_label(),
                extra: entry.measurement.extra(precision),
                timestamp: entry.id.timestamp_ms,
            })
            .collect()
    }

    /// Count and summed value per kind and unit
    pub fn totals(&self) -> Vec<KindTotal> {
        let mut grouped: BTreeMap<(MeasurementKind, String), (usize, f64)> = BTreeMap::new();
        for entry in &self.entries {
            let m = &entry.measurement;
            let slot = grouped.entry((m.kind(), m.unit_label())).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += m.primary_value();
        }
        grouped
            .into_iter()
            .map(|((kind, unit), (count, sum))| KindTotal {
                kind,
                unit,
                count,
                total: match kind {
                    MeasurementKind::Angle | MeasurementKind::Slope => None,
                    _ => Some(sum),
                },
            })
            .collect()
    }
}
