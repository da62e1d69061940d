// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Participant roster and the id-to-name lookup consumed at flush time.
//!
//! [`ParticipantDirectory`] is the narrow seam the aggregator needs: a
//! synchronous, infallible name lookup. [`MeetingRoster`] is the default
//! implementation, fed by the session layer's join/leave/rename callbacks.
//! Each roster mutation is reported to an optional [`ParticipantEventSink`]
//! with the same fire-and-forget philosophy as audio delivery.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::delivery::{ParticipantAction, ParticipantEventSink};

/// Display name reported for ids the roster has never seen.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown";

/// One participant as tracked by the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub user_id: u32,
    pub user_name: String,
    pub is_host: bool,
    pub is_audio_muted: bool,
}

impl ParticipantInfo {
    /// Convenience constructor for a non-host, unmuted participant.
    pub fn new(user_id: u32, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            is_host: false,
            is_audio_muted: false,
        }
    }
}

/// Read-only id-to-name resolution.
///
/// Implementations must not block significantly and must not fail; an
/// unregistered id resolves to [`UNKNOWN_PARTICIPANT`].
pub trait ParticipantDirectory: Send + Sync {
    /// Best-effort display name for the given speaker.
    fn name_for(&self, speaker_id: u32) -> String;
}

/// Thread-safe participant roster.
///
/// # Example
///
/// ```rust,no_run
/// use speaker_relay::roster::{MeetingRoster, ParticipantDirectory, ParticipantInfo};
///
/// # async fn example() {
/// let roster = MeetingRoster::new();
/// roster.handle_join(ParticipantInfo::new(7, "Alice")).await;
/// assert_eq!(roster.name_for(7), "Alice");
/// # }
/// ```
#[derive(Default)]
pub struct MeetingRoster {
    participants: RwLock<HashMap<u32, ParticipantInfo>>,
    events: Option<Arc<dyn ParticipantEventSink>>,
}

impl MeetingRoster {
    /// Create an empty roster with no event sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: report roster changes to the given sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn ParticipantEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    // A poisoned lock only means a holder panicked; the map is still valid.
    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<u32, ParticipantInfo>> {
        self.participants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<u32, ParticipantInfo>> {
        self.participants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a participant joining and report it.
    pub async fn handle_join(&self, info: ParticipantInfo) {
        let (user_id, user_name) = (info.user_id, info.user_name.clone());
        {
            self.write_map().insert(user_id, info);
        }
        tracing::info!(user_id, user_name = %user_name, "participant joined");
        self.notify(user_id, &user_name, ParticipantAction::Join)
            .await;
    }

    /// Record a participant leaving and report it. Unknown ids are ignored.
    pub async fn handle_leave(&self, user_id: u32) {
        let removed = { self.write_map().remove(&user_id) };
        if let Some(info) = removed {
            tracing::info!(user_id, user_name = %info.user_name, "participant left");
            self.notify(user_id, &info.user_name, ParticipantAction::Leave)
                .await;
        }
    }

    /// Record a display-name change and report it. A rename to the current
    /// name, or for an unknown id, is a no-op.
    pub async fn handle_rename(&self, user_id: u32, new_name: impl Into<String>) {
        let new_name = new_name.into();
        let changed = {
            let mut map = self.write_map();
            match map.get_mut(&user_id) {
                Some(info) if info.user_name != new_name => {
                    info.user_name = new_name.clone();
                    true
                }
                _ => false,
            }
        };
        if changed {
            tracing::info!(user_id, user_name = %new_name, "participant renamed");
            self.notify(user_id, &new_name, ParticipantAction::NameChange)
                .await;
        }
    }

    /// Replace the whole roster with a fresh snapshot (full resync after
    /// joining a session already in progress). No per-participant events
    /// are fired.
    pub fn replace_all(&self, participants: Vec<ParticipantInfo>) {
        let mut map = self.write_map();
        map.clear();
        for info in participants {
            map.insert(info.user_id, info);
        }
        tracing::info!(total = map.len(), "participant roster replaced");
    }

    /// Snapshot of all tracked participants.
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.read_map().values().cloned().collect()
    }

    /// Look up a single participant.
    pub fn get(&self, user_id: u32) -> Option<ParticipantInfo> {
        self.read_map().get(&user_id).cloned()
    }

    /// Number of tracked participants.
    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    async fn notify(&self, user_id: u32, user_name: &str, action: ParticipantAction) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(error) = events.notify(user_id, user_name, action).await {
            tracing::warn!(user_id, %action, %error, "participant notification dropped");
        }
    }
}

impl ParticipantDirectory for MeetingRoster {
    fn name_for(&self, speaker_id: u32) -> String {
        self.read_map()
            .get(&speaker_id)
            .map(|info| info.user_name.clone())
            .unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string())
    }
}

impl std::fmt::Debug for MeetingRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingRoster")
            .field("participants", &self.len())
            .field("has_event_sink", &self.events.is_some())
            .finish()
    }
}
