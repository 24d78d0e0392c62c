//! Transport Task Trait Definition
//!
//! Defines the interface between the collector and a concrete peer-discovery/session
//! transport. Implementations live outside this crate; the runtime's tests carry a
//! scripted in-process one.

use crate::{
    channel::{EffectReceiver, EventSender},
    link::LinkRole,
    Result as PeerlogResult,
};

// ----------------------------------------------------------------------------
// Transport Task Trait
// ----------------------------------------------------------------------------

/// Common interface for transport tasks
///
/// Transport tasks are independent async tasks that own the network side of the
/// peer link. They communicate with the collector task only via CSP channels.
///
/// ## Architecture
///
/// Each transport task:
/// - Runs independently with its own async event loop via the `run()` method
/// - Receives effects from the collector via `EffectReceiver` and executes them
///   (advertise/browse control, invitations, sends, session teardown)
/// - Reports discovery, session state, received bytes and inbound invitations as
///   `Event`s via `EventSender`
/// - Swallows per-message send failures; only the transport's own session state
///   events change peer state
/// - Lifecycle (spawning/aborting) is managed by `CollectorRuntime`
///
/// ## Effect buffer
///
/// Effects go out on a broadcast channel of `ChannelConfig::effect_buffer_size`.
/// The collector holds back while that buffer is full, but only briefly: a transport
/// that stalls longer falls behind, gets `RecvError::Lagged` and loses the oldest
/// effects it had not read. Transports should keep up, and should size the buffer
/// above the largest burst they expect (stop ends every session at once).
#[async_trait::async_trait]
pub trait TransportTask: Send + Sync {
    /// Attach CSP channels created by the runtime
    ///
    /// Transport implementations must store these handles internally and use them
    /// for all communication with the collector task.
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> PeerlogResult<()>;

    /// Run the transport's main event loop
    ///
    /// This future should run until its effect channel closes. On stop the collector
    /// exits after queuing its teardown effects, which closes the channel once they
    /// are read, so a transport should execute every effect it receives and return on
    /// `RecvError::Closed`. The runtime aborts transports still running after a grace
    /// period.
    async fn run(&mut self) -> PeerlogResult<()>;

    /// Link role this transport serves
    fn role(&self) -> LinkRole;
}
