// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Update feed configuration

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Where the slave daemon reads update payloads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// One JSON payload per line on standard input.
    #[default]
    Stdin,
    /// Generated time-series snapshots.
    Simulate,
    /// Serve registers without updating them.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedSource,

    /// Period of the simulated feed.
    pub interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::Stdin,
            interval_secs: 60,
        }
    }
}

impl FeedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
