// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Speaker Relay - speaker-attributed live audio aggregation and delivery.
//!
//! Speaker Relay is the forwarding half of a meeting bot: it receives raw
//! per-speaker audio fragments from a live session, accumulates them in
//! per-speaker buffers, and ships each buffer to a backend, tagged with the
//! speaker's display name, once a size or age threshold is reached. Delivery
//! is best-effort and never blocks ingestion.
//!
//! The crate is organized around a few small seams: [`delivery::DeliverySink`]
//! for where audio goes, [`roster::ParticipantDirectory`] for how speaker ids
//! become names, and [`observers::RelayObserver`] for watching what the
//! aggregator does. [`aggregator::SpeakerAggregator`] ties them together.

pub mod aggregator;
pub mod buffers;
pub mod config;
pub mod delivery;
pub mod observers;
pub mod policy;
pub mod prelude;
pub mod roster;
