//! `HostConfig`: the knobs a host instance is constructed with.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use host_core::error::{HostError, Result};
use host_core::reconnect::{DEFAULT_RETRIES_PER_STEP, DEFAULT_STEPS};
use host_protocol::schema::{default_registry, SchemaRegistry};
use url::Url;

use crate::actions::ActionFn;

const DEFAULT_ENDPOINT: &str = "wss://actions.example.com/ws";
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// `"prod"` suppresses debug-level render loop logging; `"debug"` enables it.
/// Both levels still emit `info!`/`warn!`/`error!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Prod,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Prod
    }
}

/// Builder for the settings a [`crate::host::Host`] connects with.
pub struct HostConfigBuilder {
    api_key: Option<String>,
    actions: HashMap<String, ActionFn>,
    endpoint: Url,
    log_level: LogLevel,
    rpc_timeout: Duration,
    reconnect_steps: Vec<Duration>,
    retries_per_step: u32,
    schema_registry: Arc<dyn SchemaRegistry>,
}

impl Default for HostConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            actions: HashMap::new(),
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint must be a valid URL"),
            log_level: LogLevel::default(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            reconnect_steps: DEFAULT_STEPS.to_vec(),
            retries_per_step: DEFAULT_RETRIES_PER_STEP,
            schema_registry: Arc::new(default_registry()),
        }
    }
}

impl HostConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Register one action under `name`.
    #[must_use]
    pub fn with_action(mut self, name: impl Into<String>, action: ActionFn) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Replace the whole action table at once.
    #[must_use]
    pub fn with_actions(mut self, actions: HashMap<String, ActionFn>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Override the reconnect backoff schedule (defaults to `[1s, 3s, 10s]`
    /// at 5 retries per step).
    #[must_use]
    pub fn with_reconnect_schedule(mut self, steps: Vec<Duration>, retries_per_step: u32) -> Self {
        self.reconnect_steps = steps;
        self.retries_per_step = retries_per_step;
        self
    }

    #[must_use]
    pub fn with_schema_registry(mut self, registry: Arc<dyn SchemaRegistry>) -> Self {
        self.schema_registry = registry;
        self
    }

    /// Finalize the configuration. Falls back to the `HOST_SDK_API_KEY`
    /// environment variable if no key was set on the builder; fails if
    /// neither is present.
    pub fn build(self) -> Result<HostConfig> {
        let api_key = self
            .api_key
            .or_else(|| env::var("HOST_SDK_API_KEY").ok())
            .ok_or_else(|| HostError::connection_failed("no api_key set and HOST_SDK_API_KEY is unset"))?;

        if self.reconnect_steps.is_empty() {
            return Err(HostError::connection_failed("reconnect schedule must be non-empty"));
        }

        Ok(HostConfig {
            api_key,
            actions: Arc::new(self.actions),
            endpoint: self.endpoint,
            log_level: self.log_level,
            rpc_timeout: self.rpc_timeout,
            reconnect_steps: self.reconnect_steps,
            retries_per_step: self.retries_per_step,
            schema_registry: self.schema_registry,
        })
    }
}

/// A fully resolved host configuration, ready to hand to
/// [`crate::host::Host::new`].
#[derive(Clone)]
pub struct HostConfig {
    pub api_key: String,
    pub actions: Arc<HashMap<String, ActionFn>>,
    pub endpoint: Url,
    pub log_level: LogLevel,
    pub rpc_timeout: Duration,
    pub reconnect_steps: Vec<Duration>,
    pub retries_per_step: u32,
    pub schema_registry: Arc<dyn SchemaRegistry>,
}

impl HostConfig {
    #[must_use]
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_an_api_key() {
        std::env::remove_var("HOST_SDK_API_KEY");
        let err = HostConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, HostError::ConnectionFailed(_)));
    }

    #[test]
    fn build_succeeds_with_explicit_api_key() {
        let config = HostConfigBuilder::new().with_api_key("key-123").build().unwrap();
        assert_eq!(config.api_key, "key-123");
        assert_eq!(config.reconnect_steps.len(), 3);
    }

    #[test]
    fn empty_reconnect_schedule_is_rejected() {
        let err = HostConfigBuilder::new()
            .with_api_key("key-123")
            .with_reconnect_schedule(Vec::new(), 5)
            .build()
            .unwrap_err();
        assert!(matches!(err, HostError::ConnectionFailed(_)));
    }
}
