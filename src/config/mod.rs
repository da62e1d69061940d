// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Relay configuration.
//!
//! All knobs have defaults matching the reference deployment; everything is
//! settable through builder methods before the aggregator or sink is
//! constructed, or loaded from JSON/TOML via `serde`.

use std::time::Duration;

use serde::Deserialize;

/// Default flush interval in milliseconds.
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 500;

/// Default buffer size threshold in bytes. At 16 kHz mono 16-bit this is
/// roughly half a second of audio.
pub const DEFAULT_MIN_BUFFER_SIZE_BYTES: usize = 16_000;

/// Default timeout for audio delivery requests, in seconds.
pub const DEFAULT_AUDIO_TIMEOUT_SECS: u64 = 5;

/// Default timeout for participant notification requests, in seconds.
pub const DEFAULT_PARTICIPANT_TIMEOUT_SECS: u64 = 2;

/// Configuration for the relay: backend destination, flush thresholds, and
/// delivery timeouts.
///
/// # Example
///
/// ```rust
/// use speaker_relay::config::RelayConfig;
///
/// let config = RelayConfig::new("https://backend.example.com")
///     .with_send_interval_ms(250)
///     .with_min_buffer_size_bytes(32_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the backend (without trailing slash).
    pub backend_base_url: String,
    /// Age threshold: a buffer older than this flushes on the next evaluation.
    pub send_interval_ms: u64,
    /// Size threshold: a buffer at or above this many bytes flushes immediately.
    pub min_buffer_size_bytes: usize,
    /// Timeout for audio delivery requests.
    pub audio_timeout_secs: u64,
    /// Timeout for participant notification requests.
    pub participant_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backend_base_url: String::new(),
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
            min_buffer_size_bytes: DEFAULT_MIN_BUFFER_SIZE_BYTES,
            audio_timeout_secs: DEFAULT_AUDIO_TIMEOUT_SECS,
            participant_timeout_secs: DEFAULT_PARTICIPANT_TIMEOUT_SECS,
        }
    }
}

impl RelayConfig {
    /// Create a configuration pointing at the given backend with all other
    /// settings at their defaults.
    pub fn new(backend_base_url: impl Into<String>) -> Self {
        Self {
            backend_base_url: backend_base_url.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the flush interval in milliseconds.
    pub fn with_send_interval_ms(mut self, ms: u64) -> Self {
        self.send_interval_ms = ms;
        self
    }

    /// Builder method: set the buffer size threshold in bytes.
    pub fn with_min_buffer_size_bytes(mut self, bytes: usize) -> Self {
        self.min_buffer_size_bytes = bytes;
        self
    }

    /// Builder method: set the audio delivery timeout in seconds.
    pub fn with_audio_timeout_secs(mut self, secs: u64) -> Self {
        self.audio_timeout_secs = secs;
        self
    }

    /// Builder method: set the participant notification timeout in seconds.
    pub fn with_participant_timeout_secs(mut self, secs: u64) -> Self {
        self.participant_timeout_secs = secs;
        self
    }

    /// The flush interval as a [`Duration`].
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// The audio delivery timeout as a [`Duration`].
    pub fn audio_timeout(&self) -> Duration {
        Duration::from_secs(self.audio_timeout_secs)
    }

    /// The participant notification timeout as a [`Duration`].
    pub fn participant_timeout(&self) -> Duration {
        Duration::from_secs(self.participant_timeout_secs)
    }
}
