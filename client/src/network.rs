use crate::game::{ClientWorld, LocalPlayer, MoveInput, Weapon};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{decode_server_event, encode, ClientEvent, PlayerState, ProtocolError, ServerEvent};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Failures seen by a client connection
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        source: tungstenite::Error,
    },
    #[error("websocket transport failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("connection closed by server")]
    Closed,
}

/// One WebSocket session with the server.
///
/// Wraps the socket with the JSON event codec. Each send writes one frame
/// and `next_event` waits for one event, so callers control pacing.
pub struct SessionClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SessionClient {
    /// Opens a WebSocket connection to `url`.
    ///
    /// The server answers with `init` once the connection is admitted; read
    /// it with `next_event`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|source| ClientError::Connect {
                url: url.to_string(),
                source,
            })?;
        info!("Connected to {}", url);
        Ok(Self { ws })
    }

    /// Encodes and sends one client event as a text frame.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let text = encode(event)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Reports the local player's full state. The server stores it verbatim.
    pub async fn send_move(&mut self, state: PlayerState) -> Result<(), ClientError> {
        self.send(&ClientEvent::Move(state)).await
    }

    /// Announces a shot to the other players.
    pub async fn send_shoot(&mut self) -> Result<(), ClientError> {
        self.send(&ClientEvent::Shoot).await
    }

    /// Sends a raw text frame, bypassing the encoder.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), ClientError> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Sends a binary frame. The server only speaks text, so this is for
    /// exercising its rejection path.
    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), ClientError> {
        self.ws.send(Message::Binary(data)).await?;
        Ok(())
    }

    /// Waits for the next server event. Control frames are skipped.
    pub async fn next_event(&mut self) -> Result<ServerEvent, ClientError> {
        while let Some(message) = self.ws.next().await {
            match message? {
                Message::Text(text) => return Ok(decode_server_event(&text)?),
                Message::Close(frame) => {
                    if let Some(frame) = frame {
                        debug!("Server closed connection: {}", frame.reason);
                    }
                    return Err(ClientError::Closed);
                }
                Message::Binary(_) => {
                    return Err(ProtocolError::UnsupportedFrame("binary").into());
                }
                _ => continue,
            }
        }
        Err(ClientError::Closed)
    }

    /// Sends a close frame. The server then announces the departure.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Headless player: wanders with random input and reports every step.
pub struct Bot {
    client: SessionClient,
    world: ClientWorld,
    player: LocalPlayer,
    weapon: Weapon,
    input: MoveInput,
    rng: StdRng,
    tick: Duration,
}

impl Bot {
    /// Connects and waits for the `init` snapshot before returning.
    pub async fn join(url: &str, tick: Duration, rng: StdRng) -> Result<Self, ClientError> {
        let mut client = SessionClient::connect(url).await?;
        let mut world = ClientWorld::new();

        while !world.is_initialized() {
            let event = client.next_event().await?;
            world.apply(event);
        }

        let player = LocalPlayer::from_state(world.spawn.unwrap_or_default());
        info!(
            "Joined as {} at ({:.1}, {:.1}, {:.1}), {} other players",
            world.my_id.as_ref().map(|id| id.as_str()).unwrap_or("?"),
            player.position[0],
            player.position[1],
            player.position[2],
            world.others.len()
        );

        Ok(Self {
            client,
            world,
            player,
            weapon: Weapon::new(),
            input: MoveInput::default(),
            rng,
            tick,
        })
    }

    /// The bot's mirror of the session.
    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    /// The locally simulated avatar.
    pub fn player(&self) -> &LocalPlayer {
        &self.player
    }

    /// Runs until `duration` elapses or the server goes away.
    pub async fn run(mut self, duration: Option<Duration>) -> Result<(), ClientError> {
        let mut tick_interval = interval(self.tick);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = duration.map(|d| Instant::now() + d);
        let mut last_step = Instant::now();

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }

            tokio::select! {
                event = self.client.next_event() => {
                    match event {
                        Ok(event) => self.world.apply(event),
                        Err(ClientError::Protocol(e)) => warn!("Ignoring server message: {}", e),
                        Err(e) => {
                            error!("Lost connection: {}", e);
                            return Err(e);
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = (now - last_step).as_secs_f64();
                    last_step = now;

                    self.step(dt).await?;
                },
            }
        }

        info!(
            "Leaving with {} other players in view, {} rounds left",
            self.world.others.len(),
            self.weapon.ammo
        );
        self.client.close().await
    }

    /// Advances the simulation by `dt` seconds and reports the result.
    async fn step(&mut self, dt: f64) -> Result<(), ClientError> {
        // Change direction now and then.
        if self.rng.gen_bool(0.05) {
            self.input = MoveInput {
                forward: self.rng.gen_bool(0.7),
                back: false,
                left: self.rng.gen_bool(0.2),
                right: self.rng.gen_bool(0.2),
                jump: self.rng.gen_bool(0.1),
            };
            self.player.turn(self.rng.gen_range(-1.0..1.0));
        }

        self.player.step(&self.input, dt, &self.world.colliders);
        self.weapon.update(dt);
        self.client.send_move(self.player.state()).await?;

        if self.rng.gen_bool(0.02) {
            if self.weapon.try_shoot() {
                self.client.send_shoot().await?;
            } else {
                self.weapon.start_reload();
            }
        }

        Ok(())
    }
}
