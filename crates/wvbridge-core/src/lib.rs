// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wvbridge: Envelope types, wire codec, errors and configuration shared by
// the bridge runtime and its hosts.

pub mod codec;
pub mod config;
pub mod error;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, DecodeError};
pub use types::*;
