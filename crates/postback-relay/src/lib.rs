// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relays email delivery log events from a logging pipeline to an HTTP
//! postback endpoint, one GET per event.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod event;
#[cfg(unix)]
pub mod fdk;
pub mod http_utils;
pub mod logger;
pub mod postback;
pub mod relay;
pub mod sender;
