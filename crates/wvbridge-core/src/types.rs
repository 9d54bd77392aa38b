// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the web-view bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for one bridge instance, used to tell instances apart
/// in logs when a host embeds several web views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeId(pub Uuid);

impl BridgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BridgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of bridge traffic.
///
/// On the wire this is a JSON object with camelCase keys. Absent fields are
/// omitted rather than written as `null`, and a `null` payload is the same as
/// no payload at all, so `data`/`response_data` use `Value::Null` for
/// "absent".
///
/// A well-formed envelope is either a request (`handler_name` set,
/// `response_id` absent) or a response (`response_id` set, `handler_name`
/// absent). See [`Envelope::kind`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Request payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Correlation id the sender expects to see again as `response_id`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::codec::lenient_id"
    )]
    pub callback_id: Option<String>,
    /// Name of the handler the request targets.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::codec::lenient_name"
    )]
    pub handler_name: Option<String>,
    /// Correlation id of the request this envelope answers.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::codec::lenient_id"
    )]
    pub response_id: Option<String>,
    /// Response payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub response_data: Value,
}

/// Shape of an envelope as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Response,
    /// Both or neither of `handler_name`/`response_id` are set.
    Invalid,
}

impl Envelope {
    /// Build a request for `handler_name`, optionally expecting a response
    /// under `callback_id`.
    pub fn request(
        handler_name: impl Into<String>,
        data: Value,
        callback_id: Option<String>,
    ) -> Self {
        Self {
            data,
            callback_id,
            handler_name: Some(handler_name.into()),
            ..Default::default()
        }
    }

    /// Build a response answering the request whose `callback_id` was
    /// `response_id`.
    pub fn response(response_id: impl Into<String>, response_data: Value) -> Self {
        Self {
            response_id: Some(response_id.into()),
            response_data,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        match (&self.handler_name, &self.response_id) {
            (Some(_), None) => EnvelopeKind::Request,
            (None, Some(_)) => EnvelopeKind::Response,
            _ => EnvelopeKind::Invalid,
        }
    }

    pub fn is_request(&self) -> bool {
        self.kind() == EnvelopeKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind() == EnvelopeKind::Response
    }
}

/// Lifecycle of a bridge instance.
///
/// Construction installs the reserved handlers before the instance is handed
/// out, so callers only ever observe these three states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    /// Remote script not injected yet; outbound traffic is buffered.
    NotReady,
    /// Startup buffer flushed; outbound traffic goes straight to the surface.
    Ready,
    /// Torn down. Terminal; every operation is a no-op.
    Disposed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BridgeState::NotReady => "not-ready",
            BridgeState::Ready => "ready",
            BridgeState::Disposed => "disposed",
        };
        f.write_str(label)
    }
}
