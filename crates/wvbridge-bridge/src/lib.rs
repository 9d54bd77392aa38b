// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wvbridge bridge runtime: callback and handler registries, the startup
// buffer, designated-thread dispatch, and the engine that ties them to a
// render surface.
//
// Hosts implement `RenderSurface` for their web view, build a `Bridge`, and
// feed it page messages (`on_inbound_text`) and load progress
// (`on_progress_changed`). `stub` and `loopback` provide surfaces for
// headless builds and tests.

pub mod callbacks;
pub mod dispatch;
pub mod engine;
pub mod handlers;
pub mod loopback;
pub mod script;
pub mod startup;
pub mod stub;
pub mod traits;

pub use callbacks::ResponseCallback;
pub use engine::{Bridge, BridgeBuilder, InboundOutcome, MainLoop, Responder, WeakBridge};
pub use loopback::LoopbackSurface;
pub use script::{FileScript, StaticScript};
pub use traits::{CloseWindowListener, Handler, RenderSurface, ScriptSource};
