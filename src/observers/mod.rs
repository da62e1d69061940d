// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Observer hooks for aggregator lifecycle events.
//!
//! An observer sees what the aggregator does without participating in the
//! data path: a speaker appearing for the first time, a buffer detaching for
//! delivery, a delivery being dropped. Every handler has a default no-op
//! implementation, so implementors only write the callbacks they care about.

use async_trait::async_trait;

use crate::policy::FlushTrigger;

/// Event data for the first fragment received from an unseen speaker.
#[derive(Debug, Clone)]
pub struct SpeakerAdded {
    /// Id of the new speaker.
    pub speaker_id: u32,
    /// Display name resolved at creation time ("Unknown" if unregistered).
    pub display_name: String,
    /// Sample rate captured from the first fragment.
    pub sample_rate: u32,
    /// Channel count captured from the first fragment.
    pub channels: u16,
}

/// Event data for a buffer detached for delivery.
#[derive(Debug, Clone)]
pub struct BufferFlushed {
    /// Speaker whose buffer was detached.
    pub speaker_id: u32,
    /// Size of the detached payload in bytes.
    pub byte_len: usize,
    /// The policy trigger, or `None` for an explicit flush.
    pub trigger: Option<FlushTrigger>,
}

/// Event data for a payload dropped after a failed delivery.
#[derive(Debug, Clone)]
pub struct DeliveryFailed {
    /// Speaker whose payload was dropped.
    pub speaker_id: u32,
    /// Size of the dropped payload in bytes.
    pub byte_len: usize,
    /// Rendered delivery error.
    pub error: String,
}

/// Capability-set observer for relay events.
///
/// Handlers default to no-ops; an implementor that only wants to know about
/// new speakers implements `on_speaker_added` and nothing else.
#[async_trait]
pub trait RelayObserver: Send + Sync {
    /// Called once per speaker, when the first fragment creates its buffer.
    async fn on_speaker_added(&self, _event: &SpeakerAdded) {}

    /// Called on every detach, whether policy-triggered or explicit.
    async fn on_buffer_flushed(&self, _event: &BufferFlushed) {}

    /// Called when a detached payload could not be delivered and was dropped.
    async fn on_delivery_failed(&self, _event: &DeliveryFailed) {}
}
