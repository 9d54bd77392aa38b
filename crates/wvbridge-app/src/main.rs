// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wvbridge-demo: drives a bridge against an in-process page.
//
// Usage: wvbridge-demo [CONFIG]
//
// Entry point. Initialises logging, loads configuration (falling back to
// defaults), runs one scripted session and prints what came back.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use wvbridge_core::BridgeConfig;

use services::data_dir;
use services::session::run_session;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(data_dir::default_config_path);
    tracing::info!(path = %config_path.display(), "wvbridge demo starting");

    let config = BridgeConfig::load_or_default(&config_path);

    match run_session(config, RESPONSE_TIMEOUT).await {
        Ok(report) => {
            println!("greeting:        {}", display(report.greeting.as_ref()));
            println!(
                "page has greet:  {}",
                report.page_has_greet.map_or("no answer".to_string(), |b| b.to_string())
            );
            println!("native echo:     {}", display(report.echo.as_ref()));
            println!("bridge state:    {}", report.final_state);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "bridge session failed");
            ExitCode::FAILURE
        }
    }
}

fn display(value: Option<&serde_json::Value>) -> String {
    value.map_or_else(|| "no answer".to_string(), ToString::to_string)
}
