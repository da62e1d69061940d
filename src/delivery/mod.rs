// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Delivery sinks: where flushed audio and participant events go.
//!
//! The aggregator only knows the [`DeliverySink`] trait; the roster only
//! knows [`ParticipantEventSink`]. [`HttpDeliverySink`] implements both
//! against the backend's live endpoints:
//!
//! - `POST <base>/api/live/audio` -- multipart form with `user_id`,
//!   `user_name`, and `audio_data` (raw PCM, `audio/raw`).
//! - `POST <base>/api/live/participant` -- JSON body
//!   `{user_id, user_name, action}`.
//!
//! Both endpoints are best-effort: short timeouts, no retries. Callers treat
//! a returned error as a dropped payload and move on.

pub mod multipart;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::RelayConfig;
use self::multipart::MultipartForm;

/// Errors surfaced by a delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no backend URL configured")]
    NoBackend,
}

/// Participant lifecycle change reported to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Join,
    Leave,
    NameChange,
}

impl ParticipantAction {
    /// The wire string for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::NameChange => "name_change",
        }
    }
}

impl fmt::Display for ParticipantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination for flushed speaker audio.
///
/// Implementations must be callable without any aggregator-internal lock
/// held, and slowness must only delay the calling speaker's next flush.
/// Payloads for one speaker arrive in detach order as long as that speaker's
/// fragments are ingested from a single task, which is the upstream contract.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Ship one detached payload, tagged with the speaker's identity.
    async fn send(
        &self,
        speaker_id: u32,
        display_name: &str,
        audio: &[u8],
    ) -> Result<(), DeliveryError>;
}

/// Destination for participant lifecycle notifications.
#[async_trait]
pub trait ParticipantEventSink: Send + Sync {
    /// Report a join/leave/rename for one participant.
    async fn notify(
        &self,
        user_id: u32,
        user_name: &str,
        action: ParticipantAction,
    ) -> Result<(), DeliveryError>;
}

/// JSON body for the participant endpoint.
#[derive(Debug, Serialize)]
struct ParticipantEventBody<'a> {
    user_id: u32,
    user_name: &'a str,
    action: ParticipantAction,
}

/// HTTP sink posting to the backend's live endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use speaker_relay::delivery::HttpDeliverySink;
///
/// let sink = HttpDeliverySink::new("https://backend.example.com");
/// ```
pub struct HttpDeliverySink {
    base_url: String,
    audio_timeout: Duration,
    participant_timeout: Duration,
    client: reqwest::Client,
}

impl HttpDeliverySink {
    /// Create a sink for the given backend base URL with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            audio_timeout: Duration::from_secs(crate::config::DEFAULT_AUDIO_TIMEOUT_SECS),
            participant_timeout: Duration::from_secs(
                crate::config::DEFAULT_PARTICIPANT_TIMEOUT_SECS,
            ),
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a sink from a [`RelayConfig`].
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.backend_base_url.clone())
            .with_audio_timeout(config.audio_timeout())
            .with_participant_timeout(config.participant_timeout())
    }

    /// Builder method: set the audio request timeout.
    pub fn with_audio_timeout(mut self, timeout: Duration) -> Self {
        self.audio_timeout = timeout;
        self
    }

    /// Builder method: set the participant request timeout.
    pub fn with_participant_timeout(mut self, timeout: Duration) -> Self {
        self.participant_timeout = timeout;
        self
    }

    /// Builder method: use a custom `reqwest::Client`.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn audio_url(&self) -> String {
        format!("{}/api/live/audio", self.base_url.trim_end_matches('/'))
    }

    fn participant_url(&self) -> String {
        format!(
            "{}/api/live/participant",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Build the multipart body for one audio payload.
    ///
    /// Returns `(content_type_header_value, body_bytes)`.
    fn build_audio_body(speaker_id: u32, display_name: &str, audio: &[u8]) -> (String, Vec<u8>) {
        let mut form = MultipartForm::new("Audio");
        form.add_text("user_id", &speaker_id.to_string());
        form.add_text("user_name", display_name);
        form.add_bytes("audio_data", "audio/raw", audio);
        form.finish()
    }

    async fn check_status(response: reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status { status, body })
    }
}

impl fmt::Debug for HttpDeliverySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDeliverySink")
            .field("base_url", &self.base_url)
            .field("audio_timeout", &self.audio_timeout)
            .field("participant_timeout", &self.participant_timeout)
            .finish()
    }
}

#[async_trait]
impl DeliverySink for HttpDeliverySink {
    async fn send(
        &self,
        speaker_id: u32,
        display_name: &str,
        audio: &[u8],
    ) -> Result<(), DeliveryError> {
        if self.base_url.is_empty() {
            return Err(DeliveryError::NoBackend);
        }

        let url = self.audio_url();
        let (content_type, body) = Self::build_audio_body(speaker_id, display_name, audio);

        tracing::debug!(
            speaker_id,
            display_name,
            bytes = audio.len(),
            %url,
            "posting audio payload"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", content_type)
            .timeout(self.audio_timeout)
            .body(body)
            .send()
            .await?;

        Self::check_status(response).await
    }
}

#[async_trait]
impl ParticipantEventSink for HttpDeliverySink {
    async fn notify(
        &self,
        user_id: u32,
        user_name: &str,
        action: ParticipantAction,
    ) -> Result<(), DeliveryError> {
        if self.base_url.is_empty() {
            return Err(DeliveryError::NoBackend);
        }

        let url = self.participant_url();
        let body = ParticipantEventBody {
            user_id,
            user_name,
            action,
        };

        tracing::debug!(user_id, user_name, %action, %url, "posting participant event");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.participant_timeout)
            .send()
            .await?;

        Self::check_status(response).await
    }
}
