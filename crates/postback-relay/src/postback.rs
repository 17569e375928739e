// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Postback parameters, target URL construction and the logged outcome.

use crate::error::RelayError;
use crate::event::DeliveryData;
use reqwest::Url;
use std::fmt;

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://ascentwebs.com/dyn-http-handler.php?type=s&e={email}&dc={diagnostic}&message={message}";

/// Values substituted into a postback URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostbackParams {
    pub email: String,
    pub diagnostic: String,
    pub message: String,
}

impl PostbackParams {
    fn value_of(&self, name: &str) -> Option<&str> {
        match name {
            "email" => Some(&self.email),
            "diagnostic" => Some(&self.diagnostic),
            "message" => Some(&self.message),
            _ => None,
        }
    }

    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("email", &self.email),
            ("diagnostic", &self.diagnostic),
            ("message", &self.message),
        ]
    }
}

impl From<&DeliveryData> for PostbackParams {
    fn from(data: &DeliveryData) -> Self {
        PostbackParams {
            email: data.recipient.clone(),
            diagnostic: data.smtp_status.to_string(),
            message: data.message.clone(),
        }
    }
}

/// Where postbacks are sent and how the parameters reach the endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum PostbackTarget {
    /// Raw substitution into `{email}`, `{diagnostic}` and `{message}`.
    Template(String),
    /// Parameters appended as percent-encoded query pairs.
    QueryParams(Url),
}

impl Default for PostbackTarget {
    fn default() -> Self {
        PostbackTarget::Template(DEFAULT_URL_TEMPLATE.to_string())
    }
}

impl PostbackTarget {
    pub fn url_for(&self, params: &PostbackParams) -> Result<Url, RelayError> {
        match self {
            PostbackTarget::Template(template) => {
                let rendered = render_template(template, params);
                Url::parse(&rendered).map_err(|e| RelayError::InvalidUrl {
                    url: rendered,
                    reason: e.to_string(),
                })
            }
            PostbackTarget::QueryParams(base_url) => {
                let mut url = base_url.clone();
                url.query_pairs_mut().extend_pairs(params.pairs());
                Ok(url)
            }
        }
    }
}

/// Substitutes the known placeholders in a single left-to-right pass.
///
/// Substituted values are copied verbatim and never re-scanned, so a recipient
/// containing `{message}` stays as is. Braces that do not form a known
/// placeholder are kept.
pub fn render_template(template: &str, params: &PostbackParams) -> String {
    let mut rendered = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after
            .find('}')
            .and_then(|close| params.value_of(&after[..close]).map(|value| (value, close)));

        match placeholder {
            Some((value, close)) => {
                rendered.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Response of a sent postback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostbackOutcome {
    /// Final request URL, after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for PostbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Postback sent: {} Response: HTTP {} --- {}",
            self.url,
            self.status,
            strip_newlines(&self.body)
        )
    }
}

pub fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}
