// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use postback_relay::{
    config::{log_level_from_env, RelayConfig},
    logger::Formatter,
    relay::Relay,
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = log_level_from_env();
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{log_level}");
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .event_format(Formatter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let config = match RelayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on postback relay startup: {e}");
            return ExitCode::FAILURE;
        }
    };

    let relay = match Relay::from_config(&config) {
        Ok(relay) => Arc::new(relay),
        Err(e) => {
            error!("Error creating postback relay: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("Postback relay ready with {:?} batch policy", relay.policy());

    match config.fn_listener.as_deref() {
        Some(listener) => serve(relay, listener).await,
        None => handle_stdin(&relay).await,
    }
}

#[cfg(unix)]
async fn serve(relay: Arc<Relay>, listener: &str) -> ExitCode {
    use postback_relay::fdk::FdkServer;

    let server = match FdkServer::new(relay, listener) {
        Ok(server) => server,
        Err(e) => {
            error!("Error creating function server: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel_token.clone()));

    info!("Listening for invocations on {listener}");
    match server.serve(cancel_token).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Function server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(unix))]
async fn serve(_relay: Arc<Relay>, listener: &str) -> ExitCode {
    error!("Unix sockets are not supported on this platform, cannot use {listener}");
    ExitCode::FAILURE
}

#[cfg(unix)]
async fn shutdown_on_signal(cancel_token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => debug!("Received SIGTERM"),
                _ = tokio::signal::ctrl_c() => debug!("Received Ctrl-C"),
            }
        }
        Err(e) => {
            error!("Unable to listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    cancel_token.cancel();
}

/// Local mode: relay a single payload read from stdin.
async fn handle_stdin(relay: &Relay) -> ExitCode {
    let mut payload = Vec::new();
    if let Err(e) = tokio::io::stdin().read_to_end(&mut payload).await {
        error!("Unable to read payload from stdin: {e}");
        return ExitCode::FAILURE;
    }
    relay.handle(&payload).await;
    ExitCode::SUCCESS
}
