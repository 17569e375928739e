// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::error::RelayError;
use crate::postback::PostbackOutcome;

#[async_trait]
pub trait PostbackSender {
    /// Issues a GET to `url` without a body and returns whatever the endpoint
    /// answered. Only transport failures are errors; any status code is an outcome.
    async fn send(&self, url: Url) -> Result<PostbackOutcome, RelayError>;
}

#[derive(Debug, Clone)]
pub struct HttpPostbackSender {
    client: reqwest::Client,
}

impl HttpPostbackSender {
    pub fn new(client: reqwest::Client) -> Self {
        HttpPostbackSender { client }
    }
}

#[async_trait]
impl PostbackSender for HttpPostbackSender {
    async fn send(&self, url: Url) -> Result<PostbackOutcome, RelayError> {
        debug!("Sending postback to {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        Ok(PostbackOutcome { url, status, body })
    }
}
