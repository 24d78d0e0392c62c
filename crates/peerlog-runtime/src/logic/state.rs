//! Collector State Management
//!
//! Contains the collector's owned state, statistics, and logger wrapper.

use peerlog_core::{
    task_logging::{LogLevel, NoOpLogger, TaskId, TaskLogger, TracingLogger},
    AcceptAll, AdmissionPolicy, AppEvent, CollectorConfig, Command, Effect, Event, FilterView,
    LogStore, PeerLink, SystemTimeSource, TimeSource, Timestamp,
};
use serde::Serialize;
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Collector State
// ----------------------------------------------------------------------------

/// Everything the collector task owns exclusively
pub struct CollectorState {
    /// Peer registry and connection state machine
    pub link: PeerLink,
    /// Deduplicated record store with per-device cursors
    pub store: LogStore,
    /// Filtered projection of the store
    pub view: FilterView,
    /// Decides inbound invitations (acceptor role)
    pub admission: Arc<dyn AdmissionPolicy>,
    /// Task start time
    pub start_time: Timestamp,
    /// Statistics
    pub stats: CollectorStats,
}

impl CollectorState {
    /// Create collector state from configuration, accepting every invitation
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_parts(config, Arc::new(AcceptAll), Box::new(SystemTimeSource))
    }

    pub fn with_parts(
        config: &CollectorConfig,
        admission: Arc<dyn AdmissionPolicy>,
        time_source: Box<dyn TimeSource + Send + Sync>,
    ) -> Self {
        let start_time = time_source.now();
        let mut view = FilterView::new(config.filter.clone());
        let store = LogStore::new(config.store.clone());
        view.rebuild(&store);

        Self {
            link: PeerLink::with_time_source(config.link.clone(), time_source),
            store,
            view,
            admission,
            start_time,
            stats: CollectorStats::default(),
        }
    }

    /// Seconds since the task was created, on the link's clock
    pub fn uptime_seconds(&self) -> u64 {
        self.link.core().now().duration_since(self.start_time).as_secs()
    }
}

/// Logger wrapper for object safety
#[derive(Debug, Clone)]
pub enum LoggerWrapper {
    Tracing(TracingLogger),
    NoOp(NoOpLogger),
}

impl LoggerWrapper {
    /// Pick a logger from the monitoring configuration
    pub fn from_config(config: &CollectorConfig) -> Self {
        if config.monitoring.log_channel_traffic {
            LoggerWrapper::Tracing(TracingLogger::new(config.monitoring.log_level))
        } else {
            LoggerWrapper::NoOp(NoOpLogger)
        }
    }

    pub fn log_receive_command(&self, message: &Command) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_receive(TaskId::Consumer, TaskId::Collector, message)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_receive(TaskId::Consumer, TaskId::Collector, message)
            }
        }
    }

    pub fn log_receive_event(&self, message: &Event) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_receive(TaskId::Transport, TaskId::Collector, message)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_receive(TaskId::Transport, TaskId::Collector, message)
            }
        }
    }

    pub fn log_send_effect(&self, message: &Effect) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_send(TaskId::Collector, TaskId::Transport, message)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_send(TaskId::Collector, TaskId::Transport, message)
            }
        }
    }

    pub fn log_drop_effect(&self, message: &Effect, reason: &str) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_drop(TaskId::Collector, TaskId::Transport, message, reason)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_drop(TaskId::Collector, TaskId::Transport, message, reason)
            }
        }
    }

    pub fn log_send_app_event(&self, message: &AppEvent) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_send(TaskId::Collector, TaskId::Consumer, message)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_send(TaskId::Collector, TaskId::Consumer, message)
            }
        }
    }

    pub fn log_task_event(&self, task_id: TaskId, level: LogLevel, message: &str) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_task_event(task_id, level, message),
            LoggerWrapper::NoOp(logger) => logger.log_task_event(task_id, level, message),
        }
    }
}

/// Statistics for the collector task
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectorStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub batches_received: u64,
    pub undecodable_messages: u64,
    pub retries_scheduled: u64,
}
