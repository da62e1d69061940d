// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Flush policy: the pure decision of when a speaker's buffer ships.
//!
//! Two thresholds, either one sufficient. The size trigger bounds memory for
//! a continuous speaker; the age trigger bounds latency for a quiet one.

use std::fmt;
use std::time::Duration;

use crate::config::RelayConfig;

/// Which threshold caused a flush decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The buffer reached the size threshold.
    Size,
    /// The buffer aged past the send interval.
    Age,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "size"),
            Self::Age => write!(f, "age"),
        }
    }
}

/// Stateless flush decision, evaluated after every appended fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    min_buffer_size_bytes: usize,
    send_interval: Duration,
}

impl FlushPolicy {
    /// Create a policy with explicit thresholds.
    pub fn new(min_buffer_size_bytes: usize, send_interval: Duration) -> Self {
        Self {
            min_buffer_size_bytes,
            send_interval,
        }
    }

    /// Create a policy from a [`RelayConfig`].
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.min_buffer_size_bytes, config.send_interval())
    }

    /// The size threshold in bytes.
    pub fn min_buffer_size_bytes(&self) -> usize {
        self.min_buffer_size_bytes
    }

    /// The age threshold.
    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// Decide whether a buffer with `buffered_len` bytes and the given age
    /// must flush now. Size is checked first.
    pub fn evaluate(&self, buffered_len: usize, age: Duration) -> Option<FlushTrigger> {
        if buffered_len >= self.min_buffer_size_bytes {
            Some(FlushTrigger::Size)
        } else if age >= self.send_interval {
            Some(FlushTrigger::Age)
        } else {
            None
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}
