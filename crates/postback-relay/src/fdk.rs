// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Function side of the serverless `http-stream` invocation contract.
//!
//! The host names a Unix socket through `FN_LISTENER=unix:<path>` and sends
//! every invocation as `POST /call` over HTTP/1.1 on it. The socket is bound at
//! a sibling `phony<name>` path and only then symlinked to `<name>`, so the host
//! never connects to a socket that is not ready yet.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::fs;
use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

use crate::error::FdkError;
use crate::http_utils::log_and_create_http_response;
use crate::relay::Relay;

pub const CALL_ENDPOINT_PATH: &str = "/call";
pub const FN_CALL_ID_HEADER: &str = "fn-call-id";
pub const FDK_VERSION_HEADER: &str = "fn-fdk-version";
pub const FDK_RUNTIME_HEADER: &str = "fn-fdk-runtime";
pub const FDK_VERSION: &str = concat!("fdk-rust/", env!("CARGO_PKG_VERSION"));
pub const FDK_RUNTIME: &str = "rust";

/// Socket files for one `FN_LISTENER` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    /// Path the host connects to; a symlink to `phony`.
    pub socket: PathBuf,
    pub phony: PathBuf,
}

impl SocketPaths {
    pub fn from_listener(listener: &str) -> Result<Self, FdkError> {
        let socket = listener
            .strip_prefix("unix:")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| FdkError::InvalidListener(listener.to_string()))?;
        let file_name = socket
            .file_name()
            .ok_or_else(|| FdkError::InvalidListener(listener.to_string()))?;

        let mut phony_name = std::ffi::OsString::from("phony");
        phony_name.push(file_name);
        let phony = socket.with_file_name(phony_name);
        Ok(SocketPaths { socket, phony })
    }

    fn remove(&self) {
        for path in [&self.socket, &self.phony] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("Unable to remove {}: {e}", path.display());
                }
            }
        }
    }
}

pub struct FdkServer {
    relay: Arc<Relay>,
    paths: SocketPaths,
}

impl FdkServer {
    pub fn new(relay: Arc<Relay>, listener: &str) -> Result<Self, FdkError> {
        Ok(FdkServer {
            relay,
            paths: SocketPaths::from_listener(listener)?,
        })
    }

    pub fn paths(&self) -> &SocketPaths {
        &self.paths
    }

    /// Binds the phony socket, opens it to the host and exposes it under the
    /// expected name. Stale files from an earlier run are replaced.
    pub fn bind(&self) -> Result<UnixListener, FdkError> {
        self.paths.remove();

        let listener = UnixListener::bind(&self.paths.phony)?;
        fs::set_permissions(&self.paths.phony, fs::Permissions::from_mode(0o666))?;

        let target = self
            .paths
            .phony
            .file_name()
            .map(Path::new)
            .unwrap_or(self.paths.phony.as_path());
        symlink(target, &self.paths.socket)?;

        debug!(
            "Function socket ready at {} -> {}",
            self.paths.socket.display(),
            self.paths.phony.display()
        );
        Ok(listener)
    }

    /// Serves invocations until `cancel_token` fires, then removes the socket files.
    pub async fn serve(self, cancel_token: CancellationToken) -> Result<(), FdkError> {
        let listener = self.bind()?;
        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();

        loop {
            let stream = tokio::select! {
                con_res = listener.accept() => match con_res {
                    Ok((stream, _)) => stream,
                    Err(e) if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
                    ) => {
                        debug!("Function socket connection dropped: {e}");
                        continue;
                    }
                    Err(e) => {
                        error!("Function socket accept failed: {e}");
                        self.paths.remove();
                        return Err(e.into());
                    }
                },
                // Reap finished connections so the set does not grow unbounded.
                Some(finished) = joinset.join_next(), if !joinset.is_empty() => {
                    if let Err(e) = finished {
                        error!("Function connection task failed: {e}");
                    }
                    continue;
                },
                _ = cancel_token.cancelled() => {
                    debug!("Function socket server shutting down");
                    break;
                }
            };

            let relay = Arc::clone(&self.relay);
            let service = service_fn(move |req| {
                let relay = Arc::clone(&relay);
                async move { Self::call_handler(relay, req).await }
            });
            let conn = server.serve_connection(TokioIo::new(stream), service);
            joinset.spawn(async move {
                if let Err(e) = conn.await {
                    debug!("Function connection error: {e}");
                }
            });
        }

        joinset.shutdown().await;
        self.paths.remove();
        Ok(())
    }

    async fn call_handler(
        relay: Arc<Relay>,
        req: Request<Incoming>,
    ) -> http::Result<Response<Full<Bytes>>> {
        if req.method() != Method::POST || req.uri().path() != CALL_ENDPOINT_PATH {
            return log_and_create_http_response(
                &format!("Unknown endpoint: {} {}", req.method(), req.uri().path()),
                StatusCode::NOT_FOUND,
            );
        }

        let call_id = req
            .headers()
            .get(FN_CALL_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let span = tracing::info_span!("invocation", call_id = %call_id);

        async move {
            match req.into_body().collect().await {
                Ok(body) => relay.handle(&body.to_bytes()).await,
                Err(e) => error!("Unable to read invocation payload: {e}"),
            }
        }
        .instrument(span)
        .await;

        Response::builder()
            .status(StatusCode::OK)
            .header(FDK_VERSION_HEADER, FDK_VERSION)
            .header(FDK_RUNTIME_HEADER, FDK_RUNTIME)
            .body(Full::new(Bytes::new()))
    }
}
