// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use postback_relay::config::RelayConfig;
use postback_relay::http_utils::build_client;
use postback_relay::logger::RelayLogger;
use postback_relay::postback::PostbackTarget;
use postback_relay::relay::{BatchPolicy, Relay};
use postback_relay::sender::HttpPostbackSender;
use std::sync::{Arc, Mutex};

pub const HANDLER_PATH: &str = "/dyn-http-handler.php";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Info(String),
    Error(String),
}

/// Logger that keeps every relay line for later assertions
#[derive(Default)]
pub struct CapturingLogger {
    lines: Mutex<Vec<Line>>,
}

impl CapturingLogger {
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Line::Info(message) => Some(message),
                Line::Error(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Line::Error(message) => Some(message),
                Line::Info(_) => None,
            })
            .collect()
    }
}

impl RelayLogger for CapturingLogger {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Error(message.to_string()));
    }
}

/// The production URL template pointed at `base_url`.
pub fn template_for(base_url: &str) -> String {
    format!("{base_url}{HANDLER_PATH}?type=s&e={{email}}&dc={{diagnostic}}&message={{message}}")
}

/// A relay with the real HTTP sender and a capturing logger.
pub fn relay_for(base_url: &str, policy: BatchPolicy) -> (Relay, Arc<CapturingLogger>) {
    let logger = Arc::new(CapturingLogger::default());
    let relay = Relay::new(
        PostbackTarget::Template(template_for(base_url)),
        policy,
        Arc::new(HttpPostbackSender::new(
            build_client(None, None).expect("failed to build client"),
        )),
        logger.clone(),
    );
    (relay, logger)
}

/// A production relay built from configuration, logging through `tracing`.
pub fn config_relay_for(base_url: &str) -> Relay {
    let config = RelayConfig {
        url_template: template_for(base_url),
        ..Default::default()
    };
    Relay::from_config(&config).expect("failed to create relay")
}

pub fn log_event(recipient: &str, smtp_status: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "ocid1.emaildelivery.event",
        "logContent": {
            "data": {
                "action": "accept",
                "recipient": recipient,
                "smtpStatus": smtp_status,
                "message": message
            }
        }
    })
}

pub fn payload(events: &[serde_json::Value]) -> Vec<u8> {
    serde_json::to_vec(events).expect("failed to encode payload")
}
