//! The node event loop.

use crate::node::{Node, NodeCommand, NodeError};
use crate::transport::TransportEvent;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

impl Node {
    /// Run the node until shutdown.
    ///
    /// Selects over transport events, application commands, the periodic
    /// announce and scheduled post-subscribe announces. Returns when a
    /// shutdown is requested, every handle is dropped, or the transport
    /// event channel closes.
    pub async fn run(mut self) -> Result<(), NodeError> {
        let announce_cfg = self.config.announce.clone();
        let mut announce = interval_at(
            Instant::now() + announce_cfg.initial_delay(),
            announce_cfg.interval(),
        );
        announce.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            peer_id = %self.peer_id(),
            nickname = %self.identity.nickname(),
            "Node event loop started"
        );

        loop {
            let deadline = self.next_announce_deadline();
            tokio::select! {
                event = self.transport_rx.recv() => {
                    match event {
                        Some(event) => self.handle_transport_event(event),
                        None => {
                            info!("Transport event channel closed");
                            break;
                        }
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(NodeCommand::Shutdown) | None => {
                            if let Err(e) = self.send_leave() {
                                warn!(error = %e, "Failed to send leave");
                            }
                            break;
                        }
                        Some(command) => self.handle_command(command),
                    }
                }
                _ = announce.tick() => {
                    if let Err(e) = self.send_announce() {
                        warn!(error = %e, "Failed to send announce");
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due_announces();
                }
            }
        }

        info!(peer_id = %self.peer_id(), "Node event loop stopped");
        Ok(())
    }

    /// React to one transport event.
    pub(in crate::node) fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::FrameReceived { from, data, timestamp_ms } => {
                self.handle_frame(from, &data, timestamp_ms);
            }
            TransportEvent::EndpointConnected(endpoint) => {
                debug!(endpoint = %endpoint, "Endpoint connected");
                self.endpoints.insert(endpoint);
            }
            TransportEvent::SubscriberAttached(endpoint) => {
                debug!(endpoint = %endpoint, "Subscriber attached");
                self.endpoints.insert(endpoint);
                self.schedule_subscriber_announce();
            }
            TransportEvent::EndpointDisconnected(endpoint)
            | TransportEvent::SubscriberDetached(endpoint) => {
                debug!(endpoint = %endpoint, "Endpoint gone");
                self.endpoints.remove(&endpoint);
            }
        }
    }

    /// Serve one application command. Shutdown is handled by the loop.
    pub(in crate::node) fn handle_command(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Broadcast { content, reply } => {
                let _ = reply.send(self.send_broadcast(&content));
            }
            NodeCommand::SendDirect { to, content, reply } => {
                let _ = reply.send(self.send_direct_message(&content, to));
            }
            NodeCommand::Peers { reply } => {
                let _ = reply.send(self.peers());
            }
            NodeCommand::Shutdown => {}
        }
    }
}
