use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.wit.ai";
pub const DEFAULT_API_VERSION: &str = "20240304";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a [`crate::WitClient`] needs. Built explicitly by library users;
/// the binary fills it from the environment with [`WitConfig::from_env`].
#[derive(Debug, Clone)]
pub struct WitConfig {
    pub token: String,
    pub api_version: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl WitConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `WITAI_ACCESS_TOKEN` plus the optional `WITAI_API_VERSION`,
    /// `WITAI_BASE_URL` and `WITAI_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token =
            lookup("WITAI_ACCESS_TOKEN").context("WITAI_ACCESS_TOKEN env variable not set")?;
        let mut config = Self::new(token);

        if let Some(version) = lookup("WITAI_API_VERSION") {
            config.api_version = version;
        }
        if let Some(url) = lookup("WITAI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = lookup("WITAI_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("WITAI_TIMEOUT_SECS is not a number of seconds: {secs}"))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn token_is_required() {
        assert!(WitConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = WitConfig::from_lookup(lookup(&[("WITAI_ACCESS_TOKEN", "abc")])).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn overrides_are_read() {
        let config = WitConfig::from_lookup(lookup(&[
            ("WITAI_ACCESS_TOKEN", "abc"),
            ("WITAI_API_VERSION", "20230215"),
            ("WITAI_BASE_URL", "http://localhost:9000"),
            ("WITAI_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_version, "20230215");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result = WitConfig::from_lookup(lookup(&[
            ("WITAI_ACCESS_TOKEN", "abc"),
            ("WITAI_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }
}
