// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Speaker-attributed audio aggregation.
//!
//! [`SpeakerAggregator`] receives raw per-speaker fragments, accumulates them
//! in the buffer store, and ships buffers to the [`DeliverySink`] when the
//! [`FlushPolicy`] fires or a flush is requested explicitly.
//!
//! # Locking
//!
//! The buffer store sits behind a single mutex. Every critical section is a
//! block scope covering only map and buffer mutation: get-or-create, append,
//! policy evaluation, detach. The guard drops at the end of that scope, and
//! only then does the aggregator resolve the speaker's name and call the
//! sink. Delivery never runs under the lock, so a slow backend delays only
//! the flushing speaker's next payload, never ingestion.
//!
//! # Delivery semantics
//!
//! At-most-once. Once a buffer is detached it is delivered exactly once; a
//! failed or timed-out delivery is logged and the payload dropped, never
//! re-buffered (re-buffering would interleave stale audio with newly arrived
//! fragments). Per-speaker payloads reach the sink in detach order as long
//! as that speaker's fragments are ingested from a single task, which is the
//! upstream transport's contract.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffers::SpeakerBufferStore;
use crate::delivery::DeliverySink;
use crate::observers::{BufferFlushed, DeliveryFailed, RelayObserver, SpeakerAdded};
use crate::policy::{FlushPolicy, FlushTrigger};
use crate::roster::ParticipantDirectory;

/// Aggregates per-speaker audio and forwards it, name-tagged, to a sink.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use speaker_relay::aggregator::SpeakerAggregator;
/// use speaker_relay::delivery::HttpDeliverySink;
/// use speaker_relay::roster::MeetingRoster;
///
/// # async fn example() {
/// let roster = Arc::new(MeetingRoster::new());
/// let sink = Arc::new(HttpDeliverySink::new("https://backend.example.com"));
/// let aggregator = SpeakerAggregator::new(sink, roster);
///
/// aggregator.ingest(101, 32_000, 1, &[0u8; 640]).await;
/// aggregator.close().await;
/// # }
/// ```
pub struct SpeakerAggregator {
    store: Mutex<SpeakerBufferStore>,
    policy: FlushPolicy,
    sink: Arc<dyn DeliverySink>,
    directory: Arc<dyn ParticipantDirectory>,
    observer: Option<Arc<dyn RelayObserver>>,
}

impl SpeakerAggregator {
    /// Create an aggregator with the default flush policy.
    pub fn new(sink: Arc<dyn DeliverySink>, directory: Arc<dyn ParticipantDirectory>) -> Self {
        Self {
            store: Mutex::new(SpeakerBufferStore::new()),
            policy: FlushPolicy::default(),
            sink,
            directory,
            observer: None,
        }
    }

    /// Builder method: set the flush policy. Call before the first ingest.
    pub fn with_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method: attach an observer for lifecycle events.
    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The active flush policy.
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Number of speakers currently tracked (flushed-but-active included).
    pub fn speaker_count(&self) -> usize {
        self.lock_store().len()
    }

    // A poisoned lock only means a holder panicked; the map is still valid.
    fn lock_store(&self) -> MutexGuard<'_, SpeakerBufferStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest one raw audio fragment for a speaker.
    ///
    /// An empty fragment is a silent no-op. Otherwise the fragment is
    /// appended to the speaker's buffer (created on first sight, with the
    /// fragment's audio parameters) and the flush policy is evaluated; if it
    /// fires, the buffer contents are detached and delivered after the store
    /// lock is released.
    ///
    /// Never returns an error: everything below this boundary is absorbed
    /// and logged so ingestion keeps flowing even when delivery is degraded.
    pub async fn ingest(&self, speaker_id: u32, sample_rate: u32, channels: u16, pcm: &[u8]) {
        if pcm.is_empty() {
            return;
        }

        let (created, flush) = {
            let mut store = self.lock_store();
            let (buffer, created) = store.get_or_create(speaker_id, sample_rate, channels);
            buffer.append(pcm);
            let flush = self
                .policy
                .evaluate(buffer.len(), buffer.age())
                .map(|trigger| (buffer.detach_and_reset(), trigger));
            (created, flush)
        };

        if created {
            let display_name = self.directory.name_for(speaker_id);
            tracing::info!(speaker_id, %display_name, sample_rate, channels, "new speaker");
            if let Some(observer) = &self.observer {
                observer
                    .on_speaker_added(&SpeakerAdded {
                        speaker_id,
                        display_name,
                        sample_rate,
                        channels,
                    })
                    .await;
            }
        }

        if let Some((payload, trigger)) = flush {
            self.deliver(speaker_id, payload, Some(trigger)).await;
        }
    }

    /// Force-flush one speaker's buffer regardless of policy thresholds.
    /// A missing or empty buffer is a no-op.
    pub async fn flush_one(&self, speaker_id: u32) {
        let payload = {
            let mut store = self.lock_store();
            store
                .get_mut(speaker_id)
                .filter(|buffer| !buffer.is_empty())
                .map(|buffer| buffer.detach_and_reset())
        };

        if let Some(payload) = payload {
            self.deliver(speaker_id, payload, None).await;
        }
    }

    /// Force-flush every non-empty buffer.
    ///
    /// All buffers present at call time are detached under one lock
    /// acquisition and then delivered one by one; buffers created by racing
    /// ingestion afterwards wait for their own trigger.
    pub async fn flush_all(&self) {
        let detached = { self.lock_store().detach_non_empty() };
        for (speaker_id, payload) in detached {
            self.deliver(speaker_id, payload, None).await;
        }
    }

    /// Teardown: flush every remaining buffer, then drop all speaker state.
    ///
    /// Completes all final delivery attempts before returning, so a shutdown
    /// path that awaits `close()` abandons nothing untried.
    pub async fn close(&self) {
        self.flush_all().await;
        self.lock_store().clear();
        tracing::info!("aggregator closed");
    }

    /// Flush buffers whose age has passed the policy interval. Driven by the
    /// background task spawned via [`spawn_age_flusher`](Self::spawn_age_flusher).
    async fn flush_aged(&self) {
        let detached = { self.lock_store().detach_aged(self.policy.send_interval()) };
        for (speaker_id, payload) in detached {
            self.deliver(speaker_id, payload, Some(FlushTrigger::Age)).await;
        }
    }

    /// Spawn a background task that periodically flushes aged buffers, so a
    /// speaker that goes quiet still drains within roughly one interval
    /// instead of waiting for their next fragment.
    pub fn spawn_age_flusher(self: &Arc<Self>) -> AgeFlusherHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let aggregator = Arc::clone(self);
        let period = self.policy.send_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => aggregator.flush_aged().await,
                }
            }
            tracing::debug!("age flusher stopped");
        });

        AgeFlusherHandle { token, task }
    }

    /// Deliver one detached payload: resolve the display name, call the
    /// sink, and absorb any failure. Runs strictly outside the store lock.
    async fn deliver(&self, speaker_id: u32, payload: Vec<u8>, trigger: Option<FlushTrigger>) {
        let display_name = self.directory.name_for(speaker_id);
        let byte_len = payload.len();

        tracing::debug!(speaker_id, %display_name, byte_len, ?trigger, "flushing buffer");
        if let Some(observer) = &self.observer {
            observer
                .on_buffer_flushed(&BufferFlushed {
                    speaker_id,
                    byte_len,
                    trigger,
                })
                .await;
        }

        if let Err(error) = self.sink.send(speaker_id, &display_name, &payload).await {
            tracing::warn!(speaker_id, byte_len, %error, "delivery failed, payload dropped");
            if let Some(observer) = &self.observer {
                observer
                    .on_delivery_failed(&DeliveryFailed {
                        speaker_id,
                        byte_len,
                        error: error.to_string(),
                    })
                    .await;
            }
        }
    }
}

impl std::fmt::Debug for SpeakerAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerAggregator")
            .field("speakers", &self.speaker_count())
            .field("policy", &self.policy)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

/// Handle to a running age-flush task.
pub struct AgeFlusherHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AgeFlusherHandle {
    /// Cancel the task and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Records every payload the aggregator ships.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(u32, String, Vec<u8>)>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(u32, String, Vec<u8>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliverySink for RecordingSink {
        async fn send(
            &self,
            speaker_id: u32,
            display_name: &str,
            audio: &[u8],
        ) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((speaker_id, display_name.to_string(), audio.to_vec()));
            Ok(())
        }
    }

    /// Resolves every id to the same name.
    struct FixedDirectory(&'static str);

    impl ParticipantDirectory for FixedDirectory {
        fn name_for(&self, _speaker_id: u32) -> String {
            self.0.to_string()
        }
    }

    fn aggregator_with(
        sink: Arc<RecordingSink>,
        min_size: usize,
        interval: Duration,
    ) -> SpeakerAggregator {
        SpeakerAggregator::new(sink, Arc::new(FixedDirectory("Speaker")))
            .with_policy(FlushPolicy::new(min_size, interval))
    }

    #[tokio::test]
    async fn test_empty_fragment_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 100, Duration::from_secs(10));

        aggregator.ingest(1, 16_000, 1, &[]).await;

        // No buffer was created, nothing was sent.
        assert_eq!(aggregator.speaker_count(), 0);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_accumulates_without_sending() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 100, Duration::from_secs(10));

        aggregator.ingest(1, 16_000, 1, &[0; 99]).await;

        assert_eq!(aggregator.speaker_count(), 1);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_size_trigger_ships_everything_accumulated() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_secs(10));

        // Four 5000-byte fragments; the fourth crosses the threshold.
        for _ in 0..4 {
            aggregator.ingest(101, 32_000, 1, &[7; 5_000]).await;
        }

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        let (speaker_id, display_name, payload) = &sent[0];
        assert_eq!(*speaker_id, 101);
        assert_eq!(display_name, "Speaker");
        assert_eq!(payload.len(), 20_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_trigger_fires_on_next_ingest() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_millis(500));

        aggregator.ingest(7, 32_000, 1, &[1; 10]).await;
        assert!(sink.sent().is_empty());

        tokio::time::advance(Duration::from_millis(600)).await;
        aggregator.ingest(7, 32_000, 1, &[2; 10]).await;

        // The second ingest finds the buffer over-age and ships both
        // fragments, oldest first.
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        let mut expected = vec![1u8; 10];
        expected.extend_from_slice(&[2; 10]);
        assert_eq!(sent[0].2, expected);
    }

    #[tokio::test]
    async fn test_flush_one_ships_partial_buffer() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_secs(10));

        aggregator.ingest(5, 16_000, 1, &[9; 123]).await;
        aggregator.flush_one(5).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2.len(), 123);
    }

    #[tokio::test]
    async fn test_flush_one_unknown_or_empty_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_secs(10));

        aggregator.flush_one(42).await;

        aggregator.ingest(5, 16_000, 1, &[9; 10]).await;
        aggregator.flush_one(5).await;
        aggregator.flush_one(5).await; // now empty

        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_all_ships_each_nonempty_buffer_once() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_secs(10));

        aggregator.ingest(1, 16_000, 1, &[1; 10]).await;
        aggregator.ingest(2, 16_000, 1, &[2; 20]).await;
        aggregator.ingest(3, 16_000, 1, &[3; 30]).await;
        aggregator.flush_one(2).await; // leaves speaker 2 empty

        aggregator.flush_all().await;

        let mut sent = sink.sent();
        sent.sort_by_key(|(id, _, _)| *id);
        // One explicit flush for 2, then one flush-all payload each for 1 and 3.
        assert_eq!(sent.len(), 3);
        assert_eq!((sent[0].0, sent[0].2.len()), (1, 10));
        assert_eq!((sent[1].0, sent[1].2.len()), (2, 20));
        assert_eq!((sent[2].0, sent[2].2.len()), (3, 30));
    }

    #[tokio::test]
    async fn test_close_flushes_then_clears() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = aggregator_with(sink.clone(), 16_000, Duration::from_secs(10));

        aggregator.ingest(1, 16_000, 1, &[1; 10]).await;
        aggregator.close().await;

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(aggregator.speaker_count(), 0);
    }

    /// A sink that always fails.
    struct FailingSink;

    #[async_trait]
    impl DeliverySink for FailingSink {
        async fn send(
            &self,
            _speaker_id: u32,
            _display_name: &str,
            _audio: &[u8],
        ) -> Result<(), DeliveryError> {
            Err(DeliveryError::NoBackend)
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_drops_payload_without_rebuffering() {
        let aggregator = SpeakerAggregator::new(
            Arc::new(FailingSink),
            Arc::new(FixedDirectory("Speaker")),
        )
        .with_policy(FlushPolicy::new(10, Duration::from_secs(10)));

        aggregator.ingest(1, 16_000, 1, &[1; 10]).await; // flush fails, dropped

        // The buffer was reset before delivery, so the speaker starts clean.
        let store_len = {
            let mut store = aggregator.lock_store();
            store.get_mut(1).map(|b| b.len())
        };
        assert_eq!(store_len, Some(0));
    }

    #[tokio::test]
    async fn test_observer_sees_lifecycle_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counts {
            added: AtomicUsize,
            flushed: AtomicUsize,
            failed: AtomicUsize,
        }

        #[async_trait]
        impl RelayObserver for Counts {
            async fn on_speaker_added(&self, _event: &SpeakerAdded) {
                self.added.fetch_add(1, Ordering::SeqCst);
            }
            async fn on_buffer_flushed(&self, event: &BufferFlushed) {
                assert_eq!(event.trigger, Some(FlushTrigger::Size));
                self.flushed.fetch_add(1, Ordering::SeqCst);
            }
            async fn on_delivery_failed(&self, _event: &DeliveryFailed) {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counts = Arc::new(Counts::default());
        let aggregator = SpeakerAggregator::new(
            Arc::new(FailingSink),
            Arc::new(FixedDirectory("Speaker")),
        )
        .with_policy(FlushPolicy::new(10, Duration::from_secs(10)))
        .with_observer(counts.clone());

        aggregator.ingest(1, 16_000, 1, &[1; 5]).await;
        aggregator.ingest(1, 16_000, 1, &[1; 5]).await; // crosses size threshold

        assert_eq!(counts.added.load(Ordering::SeqCst), 1);
        assert_eq!(counts.flushed.load(Ordering::SeqCst), 1);
        assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_flusher_drains_quiet_speaker() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = Arc::new(aggregator_with(
            sink.clone(),
            16_000,
            Duration::from_millis(500),
        ));
        let flusher = aggregator.spawn_age_flusher();

        aggregator.ingest(7, 32_000, 1, &[1; 10]).await;
        // No further fragments; the ticker picks the buffer up once it ages.
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2.len(), 10);

        flusher.stop().await;
    }
}
