//! Server network layer: WebSocket connections feeding a single session loop

use crate::client_manager::ClientManager;
use crate::config::{ConfigError, MapGenerationError, ServerConfig};
use crate::session::{Outgoing, Session};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{decode_client_event, encode, ClientEvent, ConnectionId, ProtocolError, ServerEvent};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{self, Message};

/// Events queued per connection before the relay starts dropping them
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("map generation failed: {0}")]
    World(#[from] MapGenerationError),
    #[error("listener failed: {0}")]
    Listener(std::io::Error),
}

/// Failures confined to one connection. They end that connection only.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket handshake failed: {0}")]
    Handshake(tungstenite::Error),
    #[error("websocket transport failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("session loop is gone")]
    SessionClosed,
}

/// Whether the session loop let a new connection in
#[derive(Debug)]
pub enum Admission {
    Accepted(ConnectionId),
    Refused(String),
}

/// Messages sent from connection tasks to the session loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        addr: SocketAddr,
        sender: mpsc::Sender<ServerEvent>,
        reply: oneshot::Sender<Admission>,
    },
    Event {
        id: ConnectionId,
        event: ClientEvent,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Session server: accepts WebSocket clients and relays their events
///
/// Connection tasks only parse and forward. All state changes happen in
/// `run`, one event at a time, in the order each connection produced them.
pub struct Server {
    listener: TcpListener,
    session: Session,
    clients: ClientManager,

    server_tx: mpsc::UnboundedSender<NetworkEvent>,
    server_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let mut session = Session::from_config(&config);
        // Generate up front so the first client does not pay for it.
        session.world()?;

        let tag: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            session,
            clients: ClientManager::new(tag, config.max_clients),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Main server loop. Runs until the task is dropped.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        info!("Server running on {}", self.local_addr().map_err(ServerError::Listener)?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => {
                            error!("Accept error: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                message = self.server_rx.recv() => {
                    // The loop holds a sender, so the channel never closes.
                    if let Some(message) = message {
                        self.handle_network_event(message);
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, server_tx).await {
                warn!("Connection from {} ended with error: {}", addr, e);
            }
        });
    }

    fn handle_network_event(&mut self, message: NetworkEvent) {
        match message {
            NetworkEvent::Connected {
                addr,
                sender,
                reply,
            } => {
                let admission = self.admit(addr, sender);
                if let Admission::Refused(reason) = &admission {
                    info!("Refused connection from {}: {}", addr, reason);
                }
                // The connection task may have died during the handshake.
                let _ = reply.send(admission);
            }

            NetworkEvent::Event { id, event } => {
                if !self.clients.contains(&id) {
                    return;
                }

                let outgoing = match event {
                    ClientEvent::Move(state) => self.session.apply_move(&id, state),
                    ClientEvent::Shoot => self.session.shoot(&id),
                };
                self.dispatch(outgoing);
            }

            NetworkEvent::Disconnected { id } => {
                self.clients.remove_client(&id);
                let outgoing = self.session.leave(&id);
                self.dispatch(outgoing);
            }
        }
    }

    /// Fans deliveries out and evicts any connection whose queue could not
    /// take a lifecycle event.
    ///
    /// Dropping the registry entry closes that connection's queue; its
    /// writer then closes the socket. The eviction is announced like a
    /// normal departure and the later `Disconnected` from the reader finds
    /// nothing left to remove.
    fn dispatch(&mut self, outgoing: Vec<Outgoing>) {
        let mut pending: VecDeque<Outgoing> = outgoing.into();

        while let Some(out) = pending.pop_front() {
            let delivery = self.clients.deliver(out);
            for id in delivery.overflowed {
                warn!("Evicting {}: outbound queue overflowed", id);
                self.clients.remove_client(&id);
                pending.extend(self.session.leave(&id));
            }
        }
    }

    fn admit(&mut self, addr: SocketAddr, sender: mpsc::Sender<ServerEvent>) -> Admission {
        let id = match self.clients.add_client(addr, sender) {
            Some(id) => id,
            None => return Admission::Refused("Server full".to_string()),
        };

        match self.session.join(&id) {
            Ok(outgoing) => {
                self.dispatch(outgoing);
                Admission::Accepted(id)
            }
            Err(e) => {
                error!("Could not place {}: {}", id, e);
                self.clients.remove_client(&id);
                Admission::Refused(format!("World unavailable: {}", e))
            }
        }
    }
}

/// Runs one WebSocket connection from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), ConnectionError> {
    let mut ws_stream = accept_async(stream)
        .await
        .map_err(ConnectionError::Handshake)?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE_CAPACITY);
    let (reply_tx, reply_rx) = oneshot::channel();

    server_tx
        .send(NetworkEvent::Connected {
            addr,
            sender: msg_tx,
            reply: reply_tx,
        })
        .map_err(|_| ConnectionError::SessionClosed)?;

    let id = match reply_rx.await.map_err(|_| ConnectionError::SessionClosed)? {
        Admission::Accepted(id) => id,
        Admission::Refused(reason) => {
            ws_stream
                .close(Some(CloseFrame {
                    code: CloseCode::Again,
                    reason: Cow::Owned(reason),
                }))
                .await?;
            return Ok(());
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = msg_rx.recv().await {
            let text = match encode(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} for {}: {}", event.name(), writer_id, e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                debug!("Write to {} failed: {}", writer_id, e);
                return;
            }
        }

        // The session dropped this connection's queue.
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Again,
            reason: Cow::Borrowed("Outbound queue overflowed"),
        }));
        if let Err(e) = ws_sender.send(close).await {
            debug!("Close to {} failed: {}", writer_id, e);
        }
    });

    let result = read_events(&id, &mut ws_receiver, &server_tx).await;

    // Always report the disconnect so the session drops this player.
    let _ = server_tx.send(NetworkEvent::Disconnected { id: id.clone() });
    writer.abort();

    result
}

async fn read_events<S>(
    id: &ConnectionId,
    ws_receiver: &mut S,
    server_tx: &mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), ConnectionError>
where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = ws_receiver.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Binary(_) => {
                warn!(
                    "Rejected frame from {}: {}",
                    id,
                    ProtocolError::UnsupportedFrame("binary")
                );
                continue;
            }
            // Pings are answered by the transport.
            _ => continue,
        };

        match decode_client_event(&text) {
            Ok(event) => {
                server_tx
                    .send(NetworkEvent::Event {
                        id: id.clone(),
                        event,
                    })
                    .map_err(|_| ConnectionError::SessionClosed)?;
            }
            Err(e) => warn!("Rejected payload from {}: {}", id, e),
        }
    }

    Ok(())
}
