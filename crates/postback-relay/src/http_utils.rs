// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use hyper::{header, http, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use reqwest::ClientBuilder;
use serde_json::json;
use tracing::{debug, error};

/// Creates a reqwest client builder using reqwest's rustls TLS implementation.
pub fn create_reqwest_client_builder() -> ClientBuilder {
    reqwest::Client::builder().use_rustls_tls()
}

/// Builds the postback client with optional proxy configuration and timeout.
///
/// Without a timeout the client waits for the endpoint indefinitely, which is
/// reqwest's default.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = create_reqwest_client_builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Does two things:
/// 1. Logs the given message. A success status code (within 200-299) will cause a debug log to be
///    written, otherwise error will be written.
/// 2. Returns the given message in the body of JSON response with the given status code.
///
/// Response body format:
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<Response<Full<Bytes>>> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
}
