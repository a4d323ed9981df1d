//! Health scoring for storage pods.
//!
//! Two scoring modes exist:
//! - [`Scorer::quick`] works from what gossip reports about a pod (public flag,
//!   uptime, version, liveness) and is computed for every pod on every cycle.
//! - [`Scorer::detailed`] needs live metrics from a direct `get-stats` poll
//!   (CPU load, measured latency, stored file count) and is only available for
//!   public pods that answered.
//!
//! Both are pure: the same input always yields the same score in `0..=100`.

use serde::{Deserialize, Serialize};

/// Upper bound of every health score.
pub const MAX_SCORE: u8 = 100;

/// Version the network is expected to run.
pub const DEFAULT_TARGET_VERSION: &str = "0.8.0";

const HOUR_SECS: u64 = 3_600;
const DAY_SECS: u64 = 24 * HOUR_SECS;

/// Inputs for the gossip-only score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickScoreInput<'a> {
    pub is_public: bool,
    pub uptime_secs: u64,
    pub version: Option<&'a str>,
    pub is_active: bool,
}

/// Inputs for the score computed from a direct stats poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailedScoreInput<'a> {
    pub cpu_percent: f64,
    pub uptime_secs: u64,
    pub latency_ms: u64,
    pub version: Option<&'a str>,
    /// Number of stored files (pages) the pod reports.
    pub total_files: u64,
}

/// Scores pods against a target software version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorer {
    target_version: String,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_VERSION)
    }
}

impl Scorer {
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            target_version: target_version.into(),
        }
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    /// Gossip-only score. Inactive pods always score zero.
    ///
    /// Alive +20, public +30, uptime +30 (> 3 days) / +20 (> 1 day) /
    /// +10 (> 1 hour), version containing the target +20, capped at 100.
    pub fn quick(&self, input: &QuickScoreInput<'_>) -> u8 {
        if !input.is_active {
            return 0;
        }

        let mut score: u32 = 20;
        if input.is_public {
            score += 30;
        }
        score += match input.uptime_secs {
            u if u > 3 * DAY_SECS => 30,
            u if u > DAY_SECS => 20,
            u if u > HOUR_SECS => 10,
            _ => 0,
        };
        if input
            .version
            .is_some_and(|v| v.contains(self.target_version.as_str()))
        {
            score += 20;
        }

        cap(score)
    }

    /// Score from a full stats poll.
    ///
    /// Uptime +30 (> 24h) / +15 (> 1h), exact target version +20, CPU below
    /// 80% +20, latency +15 (< 200ms) / +10 (< 500ms), any stored files +15.
    pub fn detailed(&self, input: &DetailedScoreInput<'_>) -> u8 {
        let mut score: u32 = match input.uptime_secs {
            u if u > DAY_SECS => 30,
            u if u > HOUR_SECS => 15,
            _ => 0,
        };
        if input.version == Some(self.target_version.as_str()) {
            score += 20;
        }
        // NaN never passes
        if input.cpu_percent < 80.0 {
            score += 20;
        }
        score += match input.latency_ms {
            l if l < 200 => 15,
            l if l < 500 => 10,
            _ => 0,
        };
        if input.total_files > 0 {
            score += 15;
        }

        cap(score)
    }
}

fn cap(score: u32) -> u8 {
    score.min(u32::from(MAX_SCORE)) as u8
}
