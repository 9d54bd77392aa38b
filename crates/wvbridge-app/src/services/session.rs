// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted bridge session against the loopback page.
//
// The bridge runs on its own designated thread; this module drives it from
// async code and waits for responses through oneshot channels.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{info, warn};
use wvbridge_bridge::{Bridge, FileScript, LoopbackSurface, Responder, StaticScript};
use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::{BridgeConfig, BridgeState};

/// Minimal bootstrap injected when the configured asset is missing: page
/// messages go out through the configured native interface object.
fn fallback_bootstrap(config: &BridgeConfig) -> String {
    format!(
        "window.WebViewJavascriptBridge = window.WebViewJavascriptBridge || \
         {{ send: function (message) {{ window.{}.notice(JSON.stringify(message)); }} }};",
        config.native_interface_name
    )
}

/// What the session observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Page answer to the `greet` request, if it arrived in time.
    pub greeting: Option<Value>,
    /// Whether the page reported having a `greet` handler.
    pub page_has_greet: Option<bool>,
    /// Native answer to the page's `nativeEcho` request.
    pub echo: Option<Value>,
    pub bootstrap_injections: usize,
    pub final_state: BridgeState,
}

async fn wait_for<T>(what: &str, rx: oneshot::Receiver<T>, limit: Duration) -> Option<T> {
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(_)) => {
            warn!(what, "callback dropped without an answer");
            None
        }
        Err(_) => {
            warn!(what, timeout_ms = limit.as_millis() as u64, "timed out waiting for answer");
            None
        }
    }
}

/// Spawn a bridge for `config`, exchange a few messages with the loopback
/// page, then dispose it.
pub async fn run_session(config: BridgeConfig, limit: Duration) -> Result<SessionReport> {
    config.validate()?;

    let surface = Arc::new(LoopbackSurface::for_config(&config));
    surface.register("greet", |data| {
        json!(format!("Hello, {}!", data.as_str().unwrap_or("stranger")))
    });

    let builder = if config.bootstrap_script.is_file() {
        let path = config.bootstrap_script.clone();
        Bridge::builder(surface.clone()).config(config).script(FileScript::new(path))
    } else {
        warn!(
            path = %config.bootstrap_script.display(),
            interface = %config.native_interface_name,
            "bootstrap script not found; using built-in fallback"
        );
        let script = StaticScript::new(fallback_bootstrap(&config));
        Bridge::builder(surface.clone()).config(config).script(script)
    };

    let bridge = tokio::task::spawn_blocking(move || builder.spawn())
        .await
        .map_err(|e| BridgeError::ThreadSpawn(e.to_string()))??;
    surface.attach(&bridge);
    info!(
        instance = %bridge.instance_id(),
        interface = surface.interface_name(),
        "bridge session started"
    );

    bridge.register_handler("nativeEcho", |data: Value, responder: Option<Responder>| {
        if let Some(responder) = responder {
            responder.respond(json!({ "echo": data }));
        }
    });

    // Queued until the page reports enough load progress.
    let (greet_tx, greet_rx) = oneshot::channel();
    bridge.call_handler_then("greet", json!("native"), move |answer| {
        let _ = greet_tx.send(answer);
    });
    let (probe_tx, probe_rx) = oneshot::channel();
    bridge.has_javascript_method("greet", move |exists| {
        let _ = probe_tx.send(exists);
    });

    for progress in [10, 45, 90, 100] {
        bridge.on_progress_changed(progress);
    }

    let greeting = wait_for("greet", greet_rx, limit).await;
    let page_has_greet = wait_for("has_javascript_method", probe_rx, limit).await;

    let (echo_tx, echo_rx) = oneshot::channel();
    surface.call_native(
        "nativeEcho",
        json!([1, 2, 3]),
        Some(Box::new(move |answer| {
            let _ = echo_tx.send(answer);
        })),
    );
    let echo = wait_for("nativeEcho", echo_rx, limit).await;

    bridge.dispose();
    let report = SessionReport {
        greeting,
        page_has_greet,
        echo,
        bootstrap_injections: surface.injections(),
        final_state: bridge.state(),
    };
    info!(
        instance = %bridge.instance_id(),
        injections = report.bootstrap_injections,
        pending = bridge.pending_callbacks(),
        "bridge session finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_exchanges_messages() {
        let report = run_session(BridgeConfig::default(), Duration::from_secs(5))
            .await
            .expect("session");

        assert_eq!(report.greeting, Some(json!("Hello, native!")));
        assert_eq!(report.page_has_greet, Some(true));
        assert_eq!(report.echo, Some(json!({ "echo": [1, 2, 3] })));
        assert_eq!(report.bootstrap_injections, 1);
        assert_eq!(report.final_state, BridgeState::Disposed);
    }

    #[tokio::test]
    async fn session_uses_bootstrap_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("bridge.js");
        std::fs::write(&script, "window.WebViewJavascriptBridge = {};").expect("write script");

        let config = BridgeConfig {
            bootstrap_script: script,
            ..Default::default()
        };
        let report = run_session(config, Duration::from_secs(5))
            .await
            .expect("session");
        assert_eq!(report.bootstrap_injections, 1);
    }

    #[test]
    fn fallback_bootstrap_posts_through_configured_interface() {
        let config = BridgeConfig {
            native_interface_name: "HostBridge".into(),
            ..Default::default()
        };
        let script = fallback_bootstrap(&config);
        assert!(script.contains("window.HostBridge.notice("));
        assert!(!script.contains("WVJBInterface"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = BridgeConfig {
            callback_prefix: String::new(),
            ..Default::default()
        };
        let err = run_session(config, Duration::from_secs(1))
            .await
            .expect_err("empty prefix");
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
