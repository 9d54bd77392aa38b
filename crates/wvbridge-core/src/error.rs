// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for wvbridge.
//
// The message protocol itself never fails loudly: undecodable payloads,
// unknown handlers and orphan responses are logged and dropped by the engine.
// These types cover decoding (so the engine can log *why* a message was
// dropped) and the ambient fallible operations around the protocol.

use thiserror::Error;

/// Why an inbound text could not be turned into an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The text is not well-formed JSON, or is JSON but not an object.
    #[error("malformed bridge payload: {0}")]
    Malformed(String),
}

/// Top-level error type for all wvbridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Protocol --
    #[error(transparent)]
    Decode(#[from] DecodeError),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Collaborators --
    #[error("render surface error: {0}")]
    Surface(String),

    #[error("bootstrap script unavailable: {0}")]
    Script(String),

    #[error("failed to start designated thread: {0}")]
    ThreadSpawn(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
