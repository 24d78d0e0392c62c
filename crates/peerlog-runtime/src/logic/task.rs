//! Collector Task Implementation
//!
//! Contains the main CollectorTask struct and its coordination logic.

use super::handlers::{CollectorHandlers, HandlerOutput};
use super::state::{CollectorState, CollectorStats, LoggerWrapper};
use peerlog_core::{
    task_logging::{LogLevel, TaskId},
    AppEvent, AppEventSender, Command, CommandReceiver, CommandSender, Effect, EffectSender,
    Event, EventReceiver, LogStore, PeerlogError, PeerlogResult,
};
use std::time::Duration;
use tokio::sync::mpsc::WeakSender;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Longest the collector waits for a full effect buffer to drain before sending anyway
const EFFECT_BACKPRESSURE: Duration = Duration::from_millis(100);

// ----------------------------------------------------------------------------
// Collector Task
// ----------------------------------------------------------------------------

/// The collector task: sole owner of the registry, store and view
pub struct CollectorTask {
    /// Collector state (registry, store, view)
    state: CollectorState,
    /// Channel for receiving commands from the consumer
    command_receiver: CommandReceiver,
    /// Handle used by retry timers to re-post commands; does not keep the channel open
    retry_sender: WeakSender<Command>,
    /// Channel for receiving events from transport tasks
    event_receiver: EventReceiver,
    /// Channel for sending effects to transport tasks
    effect_sender: EffectSender,
    /// Capacity of the effect broadcast buffer
    effect_capacity: usize,
    /// Channel for sending app events to the consumer
    app_event_sender: AppEventSender,
    /// Logger for task communication (using enum for object safety)
    logger: LoggerWrapper,
    /// Whether the task should continue running
    running: bool,
}

impl CollectorTask {
    /// Create a new collector task
    pub fn new(
        state: CollectorState,
        command_sender: &CommandSender,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        effect_capacity: usize,
        app_event_sender: AppEventSender,
        logger: LoggerWrapper,
    ) -> Self {
        Self {
            state,
            command_receiver,
            retry_sender: command_sender.downgrade(),
            event_receiver,
            effect_sender,
            effect_capacity,
            app_event_sender,
            logger,
            running: true,
        }
    }

    /// Run the main collector loop
    ///
    /// Returns when a `Shutdown` command arrives, the command channel closes, or an
    /// unrecoverable error occurs.
    pub async fn run(&mut self) -> PeerlogResult<()> {
        self.logger
            .log_task_event(TaskId::Collector, LogLevel::Info, "Collector task starting");

        let mut events_open = true;
        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => {
                            self.logger.log_receive_command(&cmd);
                            let result = self.process_command(cmd).await;
                            if let Err(e) = result {
                                self.report_error("command", e).await;
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(evt) => {
                            self.logger.log_receive_event(&evt);
                            let result = self.process_event(evt).await;
                            if let Err(e) = result {
                                self.report_error("event", e).await;
                            }
                        }
                        None => {
                            // Keep serving the consumer with what was collected
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        self.logger
            .log_task_event(TaskId::Collector, LogLevel::Info, "Collector task stopped");
        Ok(())
    }

    /// Stop the collector task after the current message
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Get current statistics
    pub fn stats(&self) -> &CollectorStats {
        &self.state.stats
    }

    /// Get the log store
    pub fn store(&self) -> &LogStore {
        &self.state.store
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    /// Recoverable errors become a `TransportFault`; anything else stops the task
    async fn report_error(&mut self, origin: &str, e: PeerlogError) {
        if !e.is_recoverable() {
            error!("Unrecoverable error processing {}, shutting down: {}", origin, e);
            self.running = false;
            return;
        }
        warn!("Error processing {}: {}", origin, e);
        if let Err(e) = self
            .send_app_event(AppEvent::TransportFault {
                error: e.to_string(),
            })
            .await
        {
            error!("Failed to report fault: {}", e);
            self.running = false;
        }
    }

    /// Process a command from the consumer
    async fn process_command(&mut self, command: Command) -> PeerlogResult<()> {
        self.state.stats.commands_processed += 1;
        let state = &mut self.state;

        let output = match command {
            Command::StartCollecting => CollectorHandlers::handle_start(state)?,
            Command::StopCollecting => CollectorHandlers::handle_stop(state)?,
            Command::ConnectToPeer {
                peer_id,
                attributes,
                context,
                reconnect,
            } => CollectorHandlers::handle_connect(state, peer_id, attributes, context, reconnect)?,
            Command::DisconnectPeer {
                peer_id,
                reason,
                reconnect,
            } => CollectorHandlers::handle_disconnect(state, peer_id, reason, reconnect)?,
            Command::RetryInvitation { peer_id } => {
                CollectorHandlers::handle_retry_invitation(state, peer_id)?
            }
            Command::SetFilter { criteria } => CollectorHandlers::handle_set_filter(state, criteria)?,
            Command::ClearLogs => CollectorHandlers::handle_clear_logs(state)?,
            Command::ImportRecords { records, replace } => {
                CollectorHandlers::handle_import(state, records, replace)?
            }
            Command::ExportRecords => CollectorHandlers::handle_export(state)?,
            Command::RequestSnapshot => CollectorHandlers::handle_snapshot(state)?,
            Command::Shutdown => {
                self.running = false;
                CollectorHandlers::handle_stop(state)?
            }
        };

        self.dispatch(output).await
    }

    /// Process an event from transport tasks
    async fn process_event(&mut self, event: Event) -> PeerlogResult<()> {
        self.state.stats.events_processed += 1;
        let state = &mut self.state;

        let output = match event {
            Event::PeerFound {
                peer_id,
                discovery_info,
            } => CollectorHandlers::handle_peer_found(state, peer_id, discovery_info)?,
            Event::PeerLost { peer_id } => CollectorHandlers::handle_peer_lost(state, peer_id)?,
            Event::SessionStateChanged {
                peer_id,
                state: session_state,
            } => CollectorHandlers::handle_session_state(state, peer_id, session_state)?,
            Event::DataReceived { peer_id, data } => {
                CollectorHandlers::handle_data_received(state, peer_id, data)?
            }
            Event::InboundInvitation { peer_id, context } => {
                CollectorHandlers::handle_inbound_invitation(state, peer_id, context)?
            }
            Event::TransportError { error } => CollectorHandlers::handle_transport_error(error)?,
        };

        self.dispatch(output).await
    }

    /// Send effects to transports, then app events to the consumer
    async fn dispatch(&mut self, (effects, app_events): HandlerOutput) -> PeerlogResult<()> {
        for effect in effects {
            self.send_effect(effect).await;
        }
        for app_event in app_events {
            self.send_app_event(app_event).await?;
        }
        Ok(())
    }

    /// Send effect to transport tasks
    ///
    /// Retries are handled here rather than by a transport. Effects sent while no
    /// transport is subscribed are dropped.
    async fn send_effect(&mut self, effect: Effect) {
        if let Effect::ScheduleRetry { delay, command } = effect {
            self.schedule_retry(delay, command);
            return;
        }

        self.wait_for_effect_capacity().await;
        self.logger.log_send_effect(&effect);
        match self.effect_sender.send(effect) {
            Ok(_) => self.state.stats.effects_generated += 1,
            Err(tokio::sync::broadcast::error::SendError(effect)) => {
                self.logger.log_drop_effect(&effect, "no transport subscribed");
            }
        }
    }

    /// Hold back while the broadcast buffer is full
    ///
    /// A send into a full buffer overwrites the oldest effect a slow transport has
    /// not read yet, which that transport then only sees as `Lagged`. Bursts such as
    /// ending every session on stop can exceed the buffer.
    async fn wait_for_effect_capacity(&self) {
        if self.effect_sender.len() < self.effect_capacity {
            return;
        }

        let deadline = Instant::now() + EFFECT_BACKPRESSURE;
        while self.effect_sender.len() >= self.effect_capacity {
            if Instant::now() >= deadline {
                warn!(
                    "Effect buffer still full after {:?}, a transport will lag",
                    EFFECT_BACKPRESSURE
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Re-post `command` after `delay`
    fn schedule_retry(&mut self, delay: Duration, command: Command) {
        self.state.stats.retries_scheduled += 1;
        self.logger.log_task_event(
            TaskId::Scheduler,
            LogLevel::Debug,
            &format!("Retrying in {:?}", delay),
        );

        let sender = self.retry_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match sender.upgrade() {
                Some(sender) => {
                    if sender.send(command).await.is_err() {
                        debug!("Collector gone before retry fired");
                    }
                }
                None => debug!("Command channel closed before retry fired"),
            }
        });
    }

    /// Send app event to the consumer
    async fn send_app_event(&mut self, app_event: AppEvent) -> PeerlogResult<()> {
        self.logger.log_send_app_event(&app_event);

        self.app_event_sender
            .send(app_event)
            .await
            .map_err(|_| PeerlogError::channel_error("App event channel closed"))?;

        self.state.stats.app_events_generated += 1;
        Ok(())
    }
}
