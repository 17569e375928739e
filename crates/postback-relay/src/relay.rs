// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The notification relay.
//!
//! One invocation carries a JSON array of email delivery log events. Each event
//! is turned into a postback GET, strictly in input order, and every outcome is
//! written to the injected [`RelayLogger`]. Nothing is retried and nothing is
//! reported back to the host: [`Relay::handle`] always returns normally.

use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{ConfigError, RelayError};
use crate::event::{decode_batch, LogEvent};
use crate::http_utils::build_client;
use crate::logger::{RelayLogger, TracingLogger};
use crate::postback::{PostbackOutcome, PostbackParams, PostbackTarget};
use crate::sender::{HttpPostbackSender, PostbackSender};

/// What happens to the rest of a batch once one event fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    /// The first failure ends the invocation; later events are dropped.
    #[default]
    AbortOnFirstError,
    /// Every event is attempted regardless of earlier failures.
    IsolateItems,
}

impl FromStr for BatchPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "abort" => Ok(BatchPolicy::AbortOnFirstError),
            "isolate" => Ok(BatchPolicy::IsolateItems),
            other => Err(ConfigError::InvalidConfig(format!(
                "Invalid batch policy '{other}'. Must be one of: abort, isolate"
            ))),
        }
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Delivered(PostbackOutcome),
    Failed(RelayError),
    /// Not attempted because an earlier event aborted the batch.
    Skipped,
}

/// Per-event outcomes of one invocation, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Delivered(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped))
    }

    fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

pub struct Relay {
    target: PostbackTarget,
    policy: BatchPolicy,
    sender: Arc<dyn PostbackSender + Send + Sync>,
    logger: Arc<dyn RelayLogger>,
}

impl Relay {
    pub fn new(
        target: PostbackTarget,
        policy: BatchPolicy,
        sender: Arc<dyn PostbackSender + Send + Sync>,
        logger: Arc<dyn RelayLogger>,
    ) -> Self {
        Relay {
            target,
            policy,
            sender,
            logger,
        }
    }

    /// Builds the production relay: reqwest sender, `tracing` logger.
    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        let target = config.postback_target()?;
        let client = build_client(config.https_proxy.as_deref(), config.timeout).map_err(|e| {
            ConfigError::InvalidConfig(format!("Unable to build postback HTTP client: {e}"))
        })?;
        Ok(Relay::new(
            target,
            config.batch_policy,
            Arc::new(HttpPostbackSender::new(client)),
            Arc::new(TracingLogger),
        ))
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Handles one invocation payload. Failures are logged, never returned.
    pub async fn handle(&self, payload: &[u8]) {
        match self.process_batch(payload).await {
            Ok(report) => debug!(
                "Processed {} log events: {} delivered, {} failed, {} skipped",
                report.outcomes.len(),
                report.delivered(),
                report.failed(),
                report.skipped()
            ),
            Err(e) => self.logger.error(&e.to_string()),
        }
    }

    /// Relays every event of `payload` according to the batch policy.
    ///
    /// Outcome lines are logged as each event completes. `Err` is returned only
    /// when the payload itself cannot be decoded, in which case nothing was sent.
    pub async fn process_batch(&self, payload: &[u8]) -> Result<BatchReport, RelayError> {
        let batch = decode_batch(payload)?;
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(batch.len()),
        };

        let mut aborted = false;
        for (index, item) in batch.iter().enumerate() {
            if aborted {
                report.outcomes.push(ItemOutcome::Skipped);
                continue;
            }

            match self.relay_event(index, item).await {
                Ok(outcome) => {
                    self.logger.info(&outcome.to_string());
                    report.outcomes.push(ItemOutcome::Delivered(outcome));
                }
                Err(e) => {
                    self.logger.error(&e.to_string());
                    report.outcomes.push(ItemOutcome::Failed(e));
                    aborted = self.policy == BatchPolicy::AbortOnFirstError;
                }
            }
        }

        Ok(report)
    }

    async fn relay_event(&self, index: usize, item: &Value) -> Result<PostbackOutcome, RelayError> {
        let event = LogEvent::from_value(index, item)?;
        let params = PostbackParams::from(event.data());
        let url = self.target.url_for(&params)?;
        self.sender.send(url).await
    }
}
