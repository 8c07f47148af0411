// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated parameter snapshots
//!
//! Produces update payloads shaped like the ones a real acquisition chain
//! sends: a JSON array of `{"ts": <unix seconds>, "v": <value>}` objects,
//! one per parameter. Parameter `p` at wall-clock minute `m` is
//! `25.0 + m / 10 + p * 0.1`, plus a uniform jitter.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use rust_modbusinator::utility::SimulatedFeed;
//!
//! let feed = SimulatedFeed::new(3).with_jitter(0.0);
//! let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
//! let values: Vec<f64> = feed.snapshot_at(at).iter().map(|e| e.v).collect();
//! assert_eq!(values.len(), 3);
//! assert!((values[2] - 28.2).abs() < 1e-9);
//! ```

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde::Serialize;

/// Default jitter amplitude, in value units.
pub const DEFAULT_JITTER: f64 = 0.05;

/// One entry of a simulated payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub ts: i64,
    pub v: f64,
}

/// Generator of simulated update payloads.
#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    num_params: usize,
    jitter: f64,
}

impl SimulatedFeed {
    pub fn new(num_params: usize) -> Self {
        Self {
            num_params,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Set the jitter amplitude. Values are drawn from `[-jitter, jitter)`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }

    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Snapshot for the instant `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<SnapshotEntry> {
        let mut rng = rand::rng();
        let ts = now.timestamp();
        let base = 25.0 + f64::from(now.minute()) / 10.0;

        (0..self.num_params)
            .map(|p| {
                let noise = if self.jitter > 0.0 {
                    rng.random_range(-self.jitter..self.jitter)
                } else {
                    0.0
                };
                SnapshotEntry {
                    ts,
                    v: base + p as f64 * 0.1 + noise,
                }
            })
            .collect()
    }

    /// JSON payload for the instant `now`.
    pub fn payload_at(&self, now: DateTime<Utc>) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot_at(now))
    }

    /// JSON payload for the current time.
    pub fn payload(&self) -> serde_json::Result<String> {
        self.payload_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn values_follow_the_minute_and_index() {
        let feed = SimulatedFeed::new(4).with_jitter(0.0);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 12, 45).unwrap();
        let snapshot = feed.snapshot_at(at);
        assert_eq!(snapshot.len(), 4);
        for (p, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.ts, at.timestamp());
            assert_abs_diff_eq!(entry.v, 26.2 + p as f64 * 0.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let feed = SimulatedFeed::new(50);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        for (p, entry) in feed.snapshot_at(at).iter().enumerate() {
            let expected = 25.0 + p as f64 * 0.1;
            assert!((entry.v - expected).abs() <= DEFAULT_JITTER);
        }
    }

    #[test]
    fn payload_is_an_array_of_objects() {
        let feed = SimulatedFeed::new(2).with_jitter(0.0);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&feed.payload_at(at).unwrap()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["ts"], at.timestamp());
        assert!(entries[1]["v"].is_number());
    }
}
