//! Centralized Configuration Management
//!
//! This module consolidates all configuration structures used by the collector so
//! the runtime and the CLI read one serde-friendly tree.

use crate::filter::FilterCriteria;
use crate::link::LinkRole;
use crate::store::TimestampOrdering;
use crate::task_logging::LogLevel;
use crate::types::PeerId;
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Bonjour-style service type both roles advertise/browse for
pub const SERVICE_ID: &str = "whist-logger";

/// Source tag producers use for their own transport chatter
pub const INTERNAL_LOG_SOURCE: &str = "logger";

/// Default retention cap of the log store
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for channel buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (consumer → collector)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (transport → collector)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (collector → transport)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (collector → consumer)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,    // Consumer commands are infrequent
            event_buffer_size: 256,     // Log batches arrive in bursts
            effect_buffer_size: 64,
            app_event_buffer_size: 256, // One view change per ingested batch
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 10,
            event_buffer_size: 32,
            effect_buffer_size: 25,
            app_event_buffer_size: 50,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Store Configuration
// ----------------------------------------------------------------------------

/// Configuration for the log store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Retention cap; the oldest record is evicted past it
    pub max_records: usize,
    /// How record timestamps are compared
    pub ordering: TimestampOrdering,
    /// Source tag left out of exports
    pub export_exclude_source: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            ordering: TimestampOrdering::Lexicographic,
            export_exclude_source: Some(INTERNAL_LOG_SOURCE.to_string()),
        }
    }
}

impl StoreConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            max_records: 1_000,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Exponential backoff bounding invitation attempts to one peer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Minimum gap after the first invitation
    pub initial_delay: Duration,
    /// Maximum gap between invitations
    pub max_delay: Duration,
    /// Gap multiplier applied after each invitation
    pub backoff_multiplier: f32,
    /// Maximum number of invitations before giving up (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_attempts: Some(5),
        }
    }
}

/// Configuration for the peer link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Which side of the session handshake this collector plays
    pub role: LinkRole,
    /// Service type to advertise or browse for
    pub service_id: String,
    /// Our own device id; discovery of it is ignored
    pub local_device: Option<PeerId>,
    /// Timeout handed to the transport with each invitation
    pub invite_timeout: Duration,
    /// Invitation backoff
    pub backoff: BackoffConfig,
    /// Maximum retained audit entries
    pub max_audit_entries: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            role: LinkRole::Initiator,
            service_id: SERVICE_ID.to_string(),
            local_device: None,
            invite_timeout: Duration::from_secs(5),
            backoff: BackoffConfig::default(),
            max_audit_entries: 1_000,
        }
    }
}

impl LinkConfig {
    /// Create configuration for the given role
    pub fn for_role(role: LinkRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            backoff: BackoffConfig::testing(),
            invite_timeout: Duration::from_millis(500),
            max_audit_entries: 100,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Monitoring Configuration
// ----------------------------------------------------------------------------

/// Configuration for channel traffic logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Log every message crossing a collector channel
    pub log_channel_traffic: bool,
    /// Minimum level for channel traffic logging
    pub log_level: LogLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_channel_traffic: false,
            log_level: LogLevel::Info,
        }
    }
}

impl MonitoringConfig {
    /// Create configuration for detailed monitoring
    pub fn detailed() -> Self {
        Self {
            log_channel_traffic: true,
            log_level: LogLevel::Debug,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self::detailed()
    }
}

// ----------------------------------------------------------------------------
// Collector Configuration
// ----------------------------------------------------------------------------

/// Master configuration for a collector instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Channel buffer configuration
    pub channels: ChannelConfig,
    /// Log store configuration
    pub store: StoreConfig,
    /// Peer link configuration
    pub link: LinkConfig,
    /// Initial filter for the live view
    pub filter: FilterCriteria,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channels: ChannelConfig::default(),
            store: StoreConfig::default(),
            link: LinkConfig::default(),
            filter: FilterCriteria::hide_internal(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            store: StoreConfig::default(),
            link: LinkConfig::testing(),
            filter: FilterCriteria::default(),
            monitoring: MonitoringConfig::testing(),
        }
    }

    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            channels: ChannelConfig::low_memory(),
            store: StoreConfig::low_memory(),
            ..Self::default()
        }
    }

    /// Builder method for the link role
    pub fn with_role(mut self, role: LinkRole) -> Self {
        self.link.role = role;
        self
    }

    /// Builder method for customizing store configuration
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Builder method for the initial filter
    pub fn with_filter(mut self, filter: FilterCriteria) -> Self {
        self.filter = filter;
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.command_buffer_size == 0 {
            return Err("Command buffer size cannot be zero".into());
        }
        if self.channels.event_buffer_size == 0 {
            return Err("Event buffer size cannot be zero".into());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("Effect buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }

        if self.store.max_records == 0 {
            return Err("Store capacity cannot be zero".into());
        }

        if self.link.service_id.is_empty() {
            return Err("Service id cannot be empty".into());
        }
        if self.link.invite_timeout.is_zero() {
            return Err("Invite timeout cannot be zero".into());
        }
        let backoff = &self.link.backoff;
        if backoff.backoff_multiplier < 1.0 {
            return Err("Backoff multiplier must be at least 1.0".into());
        }
        if backoff.initial_delay > backoff.max_delay {
            return Err("Initial backoff delay cannot be greater than max delay".into());
        }
        if backoff.max_attempts == Some(0) {
            return Err("Max invite attempts cannot be zero".into());
        }

        Ok(())
    }
}
