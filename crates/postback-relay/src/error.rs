// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while relaying one invocation payload.
///
/// None of these ever leave [`crate::relay::Relay::handle`]; they are rendered with
/// `to_string()` into a single error log line.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Payload is not a JSON array of log events: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Log event at index {index} is malformed: {source}")]
    Shape {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid postback URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Postback request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors raised while reading or validating [`crate::config::RelayConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by the function socket server
#[derive(Debug, thiserror::Error)]
pub enum FdkError {
    #[error("Invalid FN_LISTENER '{0}': expected unix:<path>")]
    InvalidListener(String),

    #[error("Socket setup failed: {0}")]
    Io(#[from] std::io::Error),
}
