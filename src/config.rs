//! Protocol configuration.
//!
//! All settings have defaults; a JSON document only needs the ones it
//! changes:
//!
//! ```
//! use gridwire::config::ProtocolConfig;
//!
//! let config = ProtocolConfig::from_json(r#"{ "connection_monitor_max_faults": 5 }"#).unwrap();
//! assert_eq!(config.connection_monitor_max_faults, 5);
//! assert_eq!(config.max_fragment_size, 128 * 1024);
//! ```

use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use crate::address::Address;
use crate::error::{GridwireError, Result};
use crate::monitor::Membership;
use crate::protocol::{
    DEFAULT_MAX_FRAGMENT_GROUPS, DEFAULT_MAX_FRAGMENT_SIZE, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_MAX_MESSAGE_SIZE,
};
use crate::writer::{WriterConfig, DEFAULT_CHANNEL_CAPACITY};

/// Default maximum concurrent handlers per server connection.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Default minimum time between two counted faults (milliseconds).
pub const DEFAULT_CONNECTION_MONITOR_INTERVAL_MS: u64 = 100;

/// Default number of counted faults tolerated before eviction.
pub const DEFAULT_CONNECTION_MONITOR_MAX_FAULTS: u32 = 3;

/// Settings shared by clients and servers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Messages larger than this on the wire are fragmented.
    pub max_fragment_size: usize,
    /// Largest frame sent or accepted from a peer.
    pub max_frame_size: usize,
    /// Largest message accepted from a peer, after reassembly.
    pub max_message_size: usize,
    /// Fragment groups a peer may keep open at once.
    pub max_fragment_groups: usize,
    /// Capacity of the per-connection outbound queue.
    pub channel_capacity: usize,
    /// Requests handled concurrently per server connection.
    pub max_concurrent_handlers: usize,
    /// Minimum time between two counted faults.
    pub connection_monitor_interval_ms: u64,
    /// Faults tolerated before an endpoint is removed.
    pub connection_monitor_max_faults: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_fragment_groups: DEFAULT_MAX_FRAGMENT_GROUPS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            connection_monitor_interval_ms: DEFAULT_CONNECTION_MONITOR_INTERVAL_MS,
            connection_monitor_max_faults: DEFAULT_CONNECTION_MONITOR_MAX_FAULTS,
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can work together.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(GridwireError::Protocol(
                "channel_capacity must be positive".into(),
            ));
        }
        if self.max_concurrent_handlers == 0 {
            return Err(GridwireError::Protocol(
                "max_concurrent_handlers must be positive".into(),
            ));
        }
        if self.max_fragment_size > self.max_frame_size {
            return Err(GridwireError::Protocol(format!(
                "max_fragment_size {} exceeds max_frame_size {}",
                self.max_fragment_size, self.max_frame_size
            )));
        }
        if self.max_message_size < self.max_frame_size {
            return Err(GridwireError::Protocol(format!(
                "max_message_size {} is below max_frame_size {}",
                self.max_message_size, self.max_frame_size
            )));
        }
        if self.max_fragment_groups == 0 {
            return Err(GridwireError::Protocol(
                "max_fragment_groups must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Minimum time between two counted faults.
    pub fn connection_monitor_interval(&self) -> Duration {
        Duration::from_millis(self.connection_monitor_interval_ms)
    }

    /// Writer settings derived from this configuration.
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            channel_capacity: self.channel_capacity,
            max_fragment_size: self.max_fragment_size,
            max_frame_size: self.max_frame_size,
        }
    }
}

/// [`Membership`] backed by static configuration.
///
/// For deployments without a membership service: thresholds come from
/// [`ProtocolConfig`] and removed endpoints are only recorded.
#[derive(Debug)]
pub struct ConfiguredMembership {
    interval: Duration,
    max_faults: u32,
    removed: Mutex<Vec<Address>>,
}

impl ConfiguredMembership {
    /// Create from configuration.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            interval: config.connection_monitor_interval(),
            max_faults: config.connection_monitor_max_faults,
            removed: Mutex::new(Vec::new()),
        }
    }

    /// Endpoints removed so far, in removal order.
    pub fn removed(&self) -> Vec<Address> {
        self.removed
            .lock()
            .map(|removed| removed.clone())
            .unwrap_or_default()
    }

    /// Check if `endpoint` was removed.
    pub fn is_removed(&self, endpoint: &Address) -> bool {
        self.removed().contains(endpoint)
    }
}

impl Membership for ConfiguredMembership {
    fn remove_endpoint(&self, endpoint: &Address) {
        tracing::debug!(endpoint = %endpoint, "Endpoint removed from membership");
        if let Ok(mut removed) = self.removed.lock() {
            removed.push(endpoint.clone());
        }
    }

    fn connection_monitor_interval(&self) -> Duration {
        self.interval
    }

    fn connection_monitor_max_faults(&self) -> u32 {
        self.max_faults
    }
}
