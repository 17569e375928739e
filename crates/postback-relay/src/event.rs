// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed view of the email delivery log events handed to the function.
//!
//! The logging pipeline delivers a JSON array of records. Only
//! `logContent.data.{recipient,smtpStatus,message}` is read; every other field
//! is ignored.

use crate::error::RelayError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub log_content: LogContent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogContent {
    pub data: DeliveryData,
}

/// Delivery fields of one relayed message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryData {
    pub recipient: String,
    pub smtp_status: DiagnosticCode,
    pub message: String,
}

/// SMTP status reported by the mail transport.
///
/// Usually a plain string such as `5.1.1`, but some log sources emit numbers or
/// structured objects. Non-string codes are passed on as their compact JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticCode {
    Text(String),
    Structured(Value),
}

impl<'de> Deserialize<'de> for DiagnosticCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(code) => Ok(DiagnosticCode::Text(code)),
            Value::Null => Err(serde::de::Error::custom("smtpStatus must not be null")),
            other => Ok(DiagnosticCode::Structured(other)),
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCode::Text(code) => f.write_str(code),
            DiagnosticCode::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl LogEvent {
    /// Decodes the element at `index` of an invocation batch.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, RelayError> {
        LogEvent::deserialize(value).map_err(|source| RelayError::Shape { index, source })
    }

    pub fn data(&self) -> &DeliveryData {
        &self.log_content.data
    }
}

/// Decodes an invocation payload into its raw batch elements.
///
/// Elements are kept untyped so that a malformed event only fails when its
/// turn comes; everything before it is still relayed.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Value>, RelayError> {
    let text = std::str::from_utf8(payload)?;
    serde_json::from_str::<Vec<Value>>(text).map_err(RelayError::Parse)
}
