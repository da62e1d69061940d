// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Per-speaker audio accumulation state.
//!
//! A [`SpeakerBuffer`] holds the raw PCM accumulated for one speaker since
//! the last flush; the [`SpeakerBufferStore`] owns the mapping from speaker
//! id to buffer. Neither type synchronizes: the store is designed to live
//! behind the aggregator's mutex, and every operation here runs inside that
//! critical section.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Accumulated raw audio for a single speaker.
///
/// `samples` is append-only between flushes; arrival order is preserved and
/// a detach always returns the gap-free concatenation of everything appended
/// since the previous detach. The audio parameters are captured from the
/// first fragment and never change for the buffer's lifetime.
#[derive(Debug)]
pub struct SpeakerBuffer {
    speaker_id: u32,
    samples: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    last_flush: Instant,
}

impl SpeakerBuffer {
    fn new(speaker_id: u32, sample_rate: u32, channels: u16) -> Self {
        Self {
            speaker_id,
            samples: Vec::new(),
            sample_rate,
            channels,
            last_flush: Instant::now(),
        }
    }

    /// The speaker this buffer belongs to.
    pub fn speaker_id(&self) -> u32 {
        self.speaker_id
    }

    /// Sample rate captured from the first fragment.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count captured from the first fragment.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no audio.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time elapsed since creation or the last detach.
    pub fn age(&self) -> Duration {
        self.last_flush.elapsed()
    }

    /// Append raw PCM bytes at the end of the sample sequence.
    pub fn append(&mut self, pcm: &[u8]) {
        self.samples.extend_from_slice(pcm);
    }

    /// Take everything buffered so far, leaving the buffer empty, and reset
    /// the flush clock. Callers hold the store lock, which is what makes
    /// this indivisible with respect to concurrent appends.
    pub fn detach_and_reset(&mut self) -> Vec<u8> {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.samples)
    }
}

/// Mapping from speaker id to [`SpeakerBuffer`].
///
/// At most one buffer exists per active speaker id. The store itself is not
/// thread-safe; the owning aggregator wraps it in a mutex.
#[derive(Debug, Default)]
pub struct SpeakerBufferStore {
    buffers: HashMap<u32, SpeakerBuffer>,
}

impl SpeakerBufferStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the buffer for `speaker_id`, creating one with the given audio
    /// parameters if absent. The boolean is `true` when a buffer was created,
    /// so the caller can surface a new-speaker event.
    pub fn get_or_create(
        &mut self,
        speaker_id: u32,
        sample_rate: u32,
        channels: u16,
    ) -> (&mut SpeakerBuffer, bool) {
        let mut created = false;
        let buffer = self.buffers.entry(speaker_id).or_insert_with(|| {
            created = true;
            SpeakerBuffer::new(speaker_id, sample_rate, channels)
        });
        (buffer, created)
    }

    /// Look up an existing buffer.
    pub fn get_mut(&mut self, speaker_id: u32) -> Option<&mut SpeakerBuffer> {
        self.buffers.get_mut(&speaker_id)
    }

    /// Detach the contents of every non-empty buffer, resetting each in
    /// place. Returns `(speaker_id, payload)` pairs.
    pub fn detach_non_empty(&mut self) -> Vec<(u32, Vec<u8>)> {
        self.buffers
            .values_mut()
            .filter(|buffer| !buffer.is_empty())
            .map(|buffer| (buffer.speaker_id(), buffer.detach_and_reset()))
            .collect()
    }

    /// Detach the contents of every non-empty buffer at least `min_age` old.
    pub fn detach_aged(&mut self, min_age: Duration) -> Vec<(u32, Vec<u8>)> {
        self.buffers
            .values_mut()
            .filter(|buffer| !buffer.is_empty() && buffer.age() >= min_age)
            .map(|buffer| (buffer.speaker_id(), buffer.detach_and_reset()))
            .collect()
    }

    /// Number of tracked speakers (empty buffers included).
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the store tracks no speakers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drop all buffers. Used at teardown after a final flush.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}
