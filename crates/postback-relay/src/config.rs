// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::Url;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::postback::{PostbackParams, PostbackTarget, DEFAULT_URL_TEMPLATE};
use crate::relay::BatchPolicy;

pub const FN_FORMAT_HTTP_STREAM: &str = "http-stream";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the postback relay and its function host glue
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// URL template with `{email}`, `{diagnostic}` and `{message}` placeholders
    pub url_template: String,
    /// When set, parameters are sent as encoded query pairs on this URL instead
    pub base_url: Option<String>,
    pub batch_policy: BatchPolicy,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// `unix:<path>` socket the function host connects to
    pub fn_listener: Option<String>,
    pub fn_format: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            base_url: None,
            batch_policy: BatchPolicy::default(),
            timeout: None,
            https_proxy: None,
            log_level: "info".to_string(),
            fn_listener: None,
            fn_format: None,
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url_template =
            env::var("POSTBACK_URL_TEMPLATE").unwrap_or_else(|_| DEFAULT_URL_TEMPLATE.to_string());
        let base_url = env::var("POSTBACK_BASE_URL")
            .ok()
            .filter(|val| !val.trim().is_empty());
        let batch_policy = match env::var("POSTBACK_BATCH_POLICY") {
            Ok(val) => val.parse::<BatchPolicy>()?,
            Err(_) => BatchPolicy::default(),
        };
        let timeout = match env::var("POSTBACK_TIMEOUT_SECS") {
            Ok(val) => Some(parse_timeout(&val)?),
            Err(_) => None,
        };
        let https_proxy = env::var("POSTBACK_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let log_level = log_level_from_env();
        let fn_listener = env::var("FN_LISTENER").ok();
        let fn_format = env::var("FN_FORMAT").ok();

        let config = Self {
            url_template,
            base_url,
            batch_policy,
            timeout,
            https_proxy,
            log_level,
            fn_listener,
            fn_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.postback_target()?;

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidConfig(
                "POSTBACK_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if let Some(listener) = &self.fn_listener {
            if !listener.starts_with("unix:") {
                return Err(ConfigError::InvalidConfig(format!(
                    "FN_LISTENER '{listener}' must start with unix:"
                )));
            }
            match self.fn_format.as_deref() {
                None | Some(FN_FORMAT_HTTP_STREAM) => {}
                Some(other) => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "Unsupported FN_FORMAT '{other}'. Only {FN_FORMAT_HTTP_STREAM} is supported"
                    )))
                }
            }
        }

        Ok(())
    }

    /// Resolves the configured postback target, checking that it yields a
    /// usable http(s) URL.
    pub fn postback_target(&self) -> Result<PostbackTarget, ConfigError> {
        let target = match &self.base_url {
            Some(base_url) => PostbackTarget::QueryParams(parse_http_url(base_url)?),
            None => {
                if self.url_template.trim().is_empty() {
                    return Err(ConfigError::InvalidConfig(
                        "POSTBACK_URL_TEMPLATE cannot be empty".to_string(),
                    ));
                }
                PostbackTarget::Template(self.url_template.clone())
            }
        };

        let sample = PostbackParams {
            email: "user@example.com".to_string(),
            diagnostic: "5.0.0".to_string(),
            message: "sample".to_string(),
        };
        let url = target
            .url_for(&sample)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        check_http_scheme(&url)?;
        Ok(target)
    }
}

/// Reads `POSTBACK_LOG_LEVEL`, lower-cased, defaulting to `info`.
pub fn log_level_from_env() -> String {
    env::var("POSTBACK_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| "info".to_string())
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            ConfigError::InvalidConfig(format!(
                "POSTBACK_TIMEOUT_SECS must be a whole number of seconds, got '{value}'"
            ))
        })
}

fn parse_http_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| {
        ConfigError::InvalidConfig(format!("Invalid postback URL '{value}': {e}"))
    })?;
    check_http_scheme(&url)?;
    Ok(url)
}

fn check_http_scheme(url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidConfig(format!(
            "Postback URL '{url}' must be an http or https URL with a host"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 9] = [
        "POSTBACK_URL_TEMPLATE",
        "POSTBACK_BASE_URL",
        "POSTBACK_BATCH_POLICY",
        "POSTBACK_TIMEOUT_SECS",
        "POSTBACK_PROXY_HTTPS",
        "HTTPS_PROXY",
        "POSTBACK_LOG_LEVEL",
        "FN_LISTENER",
        "FN_FORMAT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.postback_target().unwrap(),
            PostbackTarget::Template(DEFAULT_URL_TEMPLATE.to_string())
        );
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = RelayConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = RelayConfig {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Log level '{}' should be valid",
                level
            );
        }
    }

    #[test]
    fn test_validate_bad_templates() {
        for template in ["", "   ", "{email}", "ftp://example.com/?e={email}", "mailto:{email}"] {
            let config = RelayConfig {
                url_template: template.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_err(),
                "Template '{}' should be rejected",
                template
            );
        }
    }

    #[test]
    fn test_base_url_selects_query_params() {
        let config = RelayConfig {
            base_url: Some("https://ascentwebs.com/dyn-http-handler.php".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.postback_target().unwrap(),
            PostbackTarget::QueryParams(_)
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = RelayConfig {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_listener() {
        let config = RelayConfig {
            fn_listener: Some("tcp:0.0.0.0:8080".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            fn_listener: Some("unix:/tmp/iofs/lsnr.sock".to_string()),
            fn_format: Some("json".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            fn_listener: Some("unix:/tmp/iofs/lsnr.sock".to_string()),
            fn_format: Some("http-stream".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = RelayConfig::from_env().unwrap();
        assert_eq!(config.url_template, DEFAULT_URL_TEMPLATE);
        assert_eq!(config.batch_policy, BatchPolicy::AbortOnFirstError);
        assert_eq!(config.timeout, None);
        assert_eq!(config.https_proxy, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.fn_listener, None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var(
            "POSTBACK_URL_TEMPLATE",
            "http://localhost:9000/hook?e={email}&dc={diagnostic}",
        );
        env::set_var("POSTBACK_BATCH_POLICY", "isolate");
        env::set_var("POSTBACK_TIMEOUT_SECS", "15");
        env::set_var("HTTPS_PROXY", "http://proxy.internal:3128");
        env::set_var("POSTBACK_LOG_LEVEL", "DEBUG");
        env::set_var("FN_LISTENER", "unix:/tmp/iofs/lsnr.sock");
        env::set_var("FN_FORMAT", "http-stream");

        let config = RelayConfig::from_env().unwrap();
        clear_env();

        assert_eq!(
            config.url_template,
            "http://localhost:9000/hook?e={email}&dc={diagnostic}"
        );
        assert_eq!(config.batch_policy, BatchPolicy::IsolateItems);
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(
            config.https_proxy.as_deref(),
            Some("http://proxy.internal:3128")
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.fn_listener.as_deref(),
            Some("unix:/tmp/iofs/lsnr.sock")
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_env();
        env::set_var("POSTBACK_BATCH_POLICY", "retry");
        assert!(RelayConfig::from_env().is_err());

        clear_env();
        env::set_var("POSTBACK_TIMEOUT_SECS", "soon");
        assert!(RelayConfig::from_env().is_err());

        clear_env();
        env::set_var("POSTBACK_BASE_URL", "not a url");
        assert!(RelayConfig::from_env().is_err());
        clear_env();
    }
}
