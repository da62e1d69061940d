// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Convenience re-exports of the public surface.
//!
//! ```rust
//! use speaker_relay::prelude::*;
//! ```

pub use crate::aggregator::{AgeFlusherHandle, SpeakerAggregator};
pub use crate::buffers::{SpeakerBuffer, SpeakerBufferStore};
pub use crate::config::RelayConfig;
pub use crate::delivery::{
    DeliveryError, DeliverySink, HttpDeliverySink, ParticipantAction, ParticipantEventSink,
};
pub use crate::observers::{BufferFlushed, DeliveryFailed, RelayObserver, SpeakerAdded};
pub use crate::policy::{FlushPolicy, FlushTrigger};
pub use crate::roster::{
    MeetingRoster, ParticipantDirectory, ParticipantInfo, UNKNOWN_PARTICIPANT,
};
