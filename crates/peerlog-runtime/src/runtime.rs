//! Collector Runtime
//!
//! Wires the collector task to its transports and to the consumer. The runtime owns
//! the channels and task handles; all collector state lives inside the spawned
//! `CollectorTask`.
//!
//! ```rust,no_run
//! use peerlog_core::{CollectorConfig, Command, LinkRole, TransportTask};
//! use peerlog_runtime::CollectorRuntime;
//!
//! # struct MultipeerTransport;
//! # #[async_trait::async_trait]
//! # impl TransportTask for MultipeerTransport {
//! #     fn attach_channels(
//! #         &mut self,
//! #         _event_sender: peerlog_core::EventSender,
//! #         _effect_receiver: peerlog_core::EffectReceiver,
//! #     ) -> peerlog_core::PeerlogResult<()> { Ok(()) }
//! #     async fn run(&mut self) -> peerlog_core::PeerlogResult<()> { Ok(()) }
//! #     fn role(&self) -> LinkRole { LinkRole::Acceptor }
//! # }
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut runtime = CollectorRuntime::new(CollectorConfig::new().with_role(LinkRole::Acceptor));
//! runtime.add_transport(MultipeerTransport)?;
//! runtime.start().await?;
//!
//! let mut app_events = runtime.take_app_event_receiver().unwrap();
//! runtime.send(Command::StartCollecting).await?;
//! while let Some(event) = app_events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

use crate::logic::{CollectorState, CollectorTask, LoggerWrapper};
use peerlog_core::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel,
    task_logging::{LogLevel, TaskId},
    AcceptAll, AdmissionPolicy, AppEventReceiver, CollectorConfig, Command, CommandSender,
    EffectReceiver, EventSender, PeerlogError, PeerlogResult, SystemTimeSource, TimeSource,
    TransportError, TransportTask,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// How long `stop()` waits for the collector to wind down before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Collector Runtime
// ----------------------------------------------------------------------------

/// Runtime coordinating the collector task and its transports
pub struct CollectorRuntime {
    /// Collector configuration
    config: CollectorConfig,
    /// Logger wrapper
    logger: LoggerWrapper,
    /// Inbound invitation policy handed to the collector
    admission: Arc<dyn AdmissionPolicy>,
    /// Clock handed to the collector; consumed on start
    time_source: Option<Box<dyn TimeSource + Send + Sync>>,
    /// Registered transport tasks (before start)
    pending_transports: Vec<Box<dyn TransportTask>>,
    /// Running transport task handles (after start)
    transport_handles: Vec<JoinHandle<PeerlogResult<()>>>,
    /// Collector task handle
    collector_handle: Option<JoinHandle<PeerlogResult<()>>>,
    /// Command sender for external use
    command_sender: Option<CommandSender>,
    /// App event receiver for external use
    app_event_receiver: Option<AppEventReceiver>,
    /// Running state
    running: bool,
}

impl CollectorRuntime {
    /// Create a new runtime with custom configuration
    pub fn new(config: CollectorConfig) -> Self {
        let logger = LoggerWrapper::from_config(&config);
        Self {
            config,
            logger,
            admission: Arc::new(AcceptAll),
            time_source: None,
            pending_transports: Vec::new(),
            transport_handles: Vec::new(),
            collector_handle: None,
            command_sender: None,
            app_event_receiver: None,
            running: false,
        }
    }

    /// Create runtime optimized for testing
    pub fn for_testing() -> Self {
        Self::new(CollectorConfig::testing())
    }

    /// Decide inbound invitations with `policy` instead of accepting all
    pub fn with_admission_policy<P: AdmissionPolicy + 'static>(mut self, policy: P) -> Self {
        self.admission = Arc::new(policy);
        self
    }

    /// Drive backoff and uptime from `time_source` instead of the wall clock
    pub fn with_time_source<T: TimeSource + Send + Sync + 'static>(mut self, time_source: T) -> Self {
        self.time_source = Some(Box::new(time_source));
        self
    }

    /// Add a transport task to the runtime
    ///
    /// Transports must be added before `start()` and serve the configured link role.
    pub fn add_transport<T: TransportTask + 'static>(&mut self, transport: T) -> PeerlogResult<()> {
        if self.running {
            return Err(TransportError::InvalidConfiguration {
                reason: "Cannot add transports to a running runtime".to_string(),
            }
            .into());
        }

        if transport.role() != self.config.link.role {
            return Err(TransportError::InvalidConfiguration {
                reason: format!(
                    "Transport serves the {} role but the collector is configured as {}",
                    transport.role(),
                    self.config.link.role
                ),
            }
            .into());
        }

        self.pending_transports.push(Box::new(transport));
        Ok(())
    }

    /// Start the collector and every registered transport
    pub async fn start(&mut self) -> PeerlogResult<()> {
        if self.running {
            return Err(TransportError::InvalidConfiguration {
                reason: "Runtime already running".to_string(),
            }
            .into());
        }

        if self.pending_transports.is_empty() {
            return Err(TransportError::InvalidConfiguration {
                reason: "No transport tasks registered. Use add_transport() to register at least one transport.".to_string(),
            }
            .into());
        }

        self.config.validate().map_err(PeerlogError::config_error)?;

        // Create channels following dependency injection pattern
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (event_sender, event_receiver) = create_event_channel(&self.config.channels);
        let (effect_sender, _initial_effect_receiver) = create_effect_channel(&self.config.channels);
        let (app_event_sender, app_event_receiver) =
            create_app_event_channel(&self.config.channels);

        let time_source = self
            .time_source
            .take()
            .unwrap_or_else(|| Box::new(SystemTimeSource));
        let state = CollectorState::with_parts(&self.config, self.admission.clone(), time_source);

        let mut collector = CollectorTask::new(
            state,
            &command_sender,
            command_receiver,
            event_receiver,
            effect_sender.clone(),
            self.config.channels.effect_buffer_size,
            app_event_sender,
            self.logger.clone(),
        );
        self.collector_handle = Some(tokio::spawn(async move { collector.run().await }));

        // Each transport gets its own subscription to the broadcast effect channel
        for transport in self.pending_transports.drain(..).collect::<Vec<_>>() {
            let effect_receiver = create_effect_receiver(&effect_sender);
            let handle = self.start_transport_task(transport, event_sender.clone(), effect_receiver)?;
            self.transport_handles.push(handle);
        }

        self.command_sender = Some(command_sender);
        self.app_event_receiver = Some(app_event_receiver);
        self.running = true;

        self.logger.log_task_event(
            TaskId::Collector,
            LogLevel::Info,
            &format!(
                "Collector started as {} with {} transport(s)",
                self.config.link.role,
                self.transport_handles.len()
            ),
        );
        Ok(())
    }

    /// Stop the collector and its transports
    ///
    /// The collector is asked to shut down (ending all sessions) and given a short
    /// grace period before it is aborted. Its exit closes the effect channel, so each
    /// transport then gets the same grace period to execute the queued teardown
    /// effects and return before it is aborted.
    pub async fn stop(&mut self) -> PeerlogResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(sender) = self.command_sender.take() {
            if sender.send(Command::Shutdown).await.is_err() {
                warn!("Collector already stopped");
            }
        }

        if let Some(mut handle) = self.collector_handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(Err(e))) => warn!("Collector stopped with error: {}", e),
                Ok(Err(e)) => warn!("Collector task failed: {}", e),
                Ok(Ok(Ok(()))) => {}
                Err(_) => {
                    warn!("Collector did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                    handle.abort();
                }
            }
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for mut handle in std::mem::take(&mut self.transport_handles) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(Err(e))) => warn!("Transport stopped with error: {}", e),
                Ok(Err(e)) => warn!("Transport task failed: {}", e),
                Ok(Ok(Ok(()))) => {}
                Err(_) => {
                    warn!(
                        "Transport did not drain within {:?}, aborting",
                        SHUTDOWN_GRACE
                    );
                    handle.abort();
                }
            }
        }
        self.app_event_receiver = None;

        self.logger
            .log_task_event(TaskId::Collector, LogLevel::Info, "Collector stopped");
        Ok(())
    }

    /// Get command sender for external use
    pub fn command_sender(&self) -> Option<&CommandSender> {
        self.command_sender.as_ref()
    }

    /// Send a command to the collector
    pub async fn send(&self, command: Command) -> PeerlogResult<()> {
        let sender = self
            .command_sender
            .as_ref()
            .ok_or_else(|| PeerlogError::channel_error("Runtime not started"))?;
        sender
            .send(command)
            .await
            .map_err(|_| PeerlogError::channel_error("Collector task has stopped"))
    }

    /// Take app event receiver for external use
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Check if the runtime is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get configuration
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Number of registered (or running) transports
    pub fn transport_count(&self) -> usize {
        if self.running {
            self.transport_handles.len()
        } else {
            self.pending_transports.len()
        }
    }

    /// Start a single transport task
    fn start_transport_task(
        &self,
        mut transport: Box<dyn TransportTask>,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> PeerlogResult<JoinHandle<PeerlogResult<()>>> {
        transport.attach_channels(event_sender, effect_receiver)?;

        self.logger.log_task_event(
            TaskId::Transport,
            LogLevel::Debug,
            &format!("Starting {} transport task", transport.role()),
        );

        // The transport is responsible for its own lifecycle management
        Ok(tokio::spawn(async move { transport.run().await }))
    }
}

impl Drop for CollectorRuntime {
    fn drop(&mut self) {
        if self.running {
            // Abort tasks if runtime is dropped while running
            for handle in &self.transport_handles {
                handle.abort();
            }
            if let Some(ref handle) = self.collector_handle {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlog_core::{EffectReceiver, EventSender, LinkRole};

    struct IdleTransport(LinkRole);

    #[async_trait::async_trait]
    impl TransportTask for IdleTransport {
        fn attach_channels(
            &mut self,
            _event_sender: EventSender,
            _effect_receiver: EffectReceiver,
        ) -> PeerlogResult<()> {
            Ok(())
        }

        async fn run(&mut self) -> PeerlogResult<()> {
            Ok(())
        }

        fn role(&self) -> LinkRole {
            self.0
        }
    }

    #[tokio::test]
    async fn test_start_requires_a_transport() {
        let mut runtime = CollectorRuntime::for_testing();
        assert!(runtime.start().await.is_err());
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_transport_role_must_match() {
        let mut runtime =
            CollectorRuntime::new(CollectorConfig::testing().with_role(LinkRole::Acceptor));
        assert!(runtime
            .add_transport(IdleTransport(LinkRole::Initiator))
            .is_err());
        assert!(runtime.add_transport(IdleTransport(LinkRole::Acceptor)).is_ok());
        assert_eq!(runtime.transport_count(), 1);
    }

    #[tokio::test]
    async fn test_runtime_lifecycle() {
        let mut runtime = CollectorRuntime::for_testing();
        let role = runtime.config().link.role;
        runtime.add_transport(IdleTransport(role)).unwrap();

        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert!(runtime.command_sender().is_some());
        assert!(runtime.start().await.is_err());
        assert!(runtime.add_transport(IdleTransport(role)).is_err());

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.send(Command::RequestSnapshot).await.is_err());
    }
}
