// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logging for the relay.
//!
//! [`RelayLogger`] is the sink the relay writes its outcome lines to. The
//! function binary uses [`TracingLogger`], and renders every `tracing` event
//! with [`Formatter`]:
//!
//! ```text
//! POSTBACK_RELAY | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! ```text
//! POSTBACK_RELAY | INFO | invocation{call_id="01J..."}: Postback sent: https://... Response: HTTP 200 --- ok
//! POSTBACK_RELAY | ERROR | invocation{call_id="01J..."}: Payload is not a JSON array of log events: ...
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

/// Sink for the relay's outcome lines: one `info` per sent postback, one
/// `error` per failure.
pub trait RelayLogger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards relay lines to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RelayLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Log formatter that prefixes messages with `POSTBACK_RELAY`, so relay lines
/// can be picked out of the function log stream.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "POSTBACK_RELAY | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
