//! Connection registry and outbound fan-out for the session server
//!
//! This module handles the server-side bookkeeping of open connections:
//! - Connection identifiers that are never reused within a process
//! - Optional capacity limit
//! - Resolving delivery targets to per-connection outbound queues
//!
//! Delivery never blocks the relay. A full queue may shed `playerMoved`
//! and `playerShot`, since the next update supersedes them. Any other
//! event that does not fit marks the connection as overflowed and the
//! server evicts it, so a client never keeps a stale player list.

use crate::session::{Outgoing, Recipients};
use log::{debug, info, warn};
use shared::{ConnectionId, ServerEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// An open connection and the queue feeding its writer task
#[derive(Debug)]
pub struct Client {
    /// Identifier assigned when the connection was accepted
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Outbound events for this connection's writer task
    pub sender: mpsc::Sender<ServerEvent>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues an event without waiting.
    ///
    /// A closed queue means the connection is already going away, so the
    /// event is dropped quietly. A full queue drops transient events and
    /// reports `Overflowed` for everything else.
    pub fn send(&self, event: ServerEvent) -> SendStatus {
        match self.sender.try_send(event) {
            Ok(()) => SendStatus::Queued,
            Err(mpsc::error::TrySendError::Full(event)) if is_transient(&event) => {
                warn!(
                    "Outbound queue full for {}, dropping {}",
                    self.id,
                    event.name()
                );
                SendStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Outbound queue full for {}, cannot deliver {}",
                    self.id,
                    event.name()
                );
                SendStatus::Overflowed
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    "Connection {} already closed, dropping {}",
                    self.id,
                    event.name()
                );
                SendStatus::Dropped
            }
        }
    }
}

/// Events a later update makes obsolete.
fn is_transient(event: &ServerEvent) -> bool {
    matches!(
        event,
        ServerEvent::PlayerMoved { .. } | ServerEvent::PlayerShot { .. }
    )
}

/// What happened to one event handed to one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    Dropped,
    /// The queue was full and the event must not be lost.
    Overflowed,
}

/// Outcome of one `deliver` call
#[derive(Debug, Default, PartialEq)]
pub struct Delivery {
    /// Connections that accepted the event
    pub queued: usize,
    /// Connections that could not take a lifecycle event and must be evicted
    pub overflowed: Vec<ConnectionId>,
}

/// Tracks every open connection
///
/// Ids combine a per-process tag with a counter that only moves forward,
/// so a reconnecting client always gets a fresh identity.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    next_client_id: u64,
    tag: String,
    max_clients: Option<usize>,
}

impl ClientManager {
    pub fn new(tag: impl Into<String>, max_clients: Option<usize>) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            tag: tag.into(),
            max_clients,
        }
    }

    /// Registers a connection. Returns `None` when the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Option<ConnectionId> {
        if let Some(max) = self.max_clients {
            if self.clients.len() >= max {
                return None;
            }
        }

        let id = ConnectionId::new(format!("{}-{}", self.tag, self.next_client_id));
        self.next_client_id += 1;

        info!("User connected: {} from {}", id, addr);
        self.clients
            .insert(id.clone(), Client::new(id.clone(), addr, sender));

        Some(id)
    }

    /// Removes a connection. Returns false if it was already gone.
    pub fn remove_client(&mut self, id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!(
                "User disconnected: {} after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.clients.contains_key(id)
    }

    /// Hands an outgoing event to every matching connection's queue.
    ///
    /// The caller is expected to evict every id in `Delivery::overflowed`.
    pub fn deliver(&self, outgoing: Outgoing) -> Delivery {
        let Outgoing { to, event } = outgoing;
        let targets: Vec<&Client> = match &to {
            Recipients::Only(id) => self.clients.get(id).into_iter().collect(),
            Recipients::AllExcept(excluded) => self
                .clients
                .values()
                .filter(|client| &client.id != excluded)
                .collect(),
            Recipients::All => self.clients.values().collect(),
        };

        let mut delivery = Delivery::default();
        for client in targets {
            match client.send(event.clone()) {
                SendStatus::Queued => delivery.queued += 1,
                SendStatus::Dropped => {}
                SendStatus::Overflowed => delivery.overflowed.push(client.id.clone()),
            }
        }
        delivery
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
