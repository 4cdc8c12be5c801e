//! # Session Server Library
//!
//! This library provides the relay server for the multiplayer city shooter.
//! It owns the canonical copy of every player's position, generates the
//! shared city map, and fans movement, shooting, join and leave events out
//! to the other connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Session State
//! One player state per open connection, created on join, replaced
//! wholesale by each `move` and removed on disconnect. Positions are
//! trusted as sent; the server does not validate movement.
//!
//! ### World Generation
//! The city map is generated once per process from a grid scan with
//! independent per-cell placement draws, then shared read-only with every
//! client through its `init` snapshot.
//!
//! ### Spawn Placement
//! New players are placed by rejection sampling for a spot clear of
//! buildings and trees, falling back to a drop from the sky when the
//! attempt budget runs out. A fixed-origin strategy is also available.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! Every connection runs its own reader and writer task, but all state
//! changes happen in one loop that consumes a channel of network events.
//! Handlers run to completion before the next event is taken, so no locks
//! guard the player mapping.
//!
//! ### WebSocket Transport
//! Clients speak JSON over WebSocket, one `{"event", "data"}` envelope per
//! text frame. Broadcasts are fire-and-forget: a slow client's queue drops
//! messages rather than stalling the relay.
//!
//! ## Module Organization
//!
//! - `config`: bind address, world and spawn parameters, validation
//! - `mapgen`: the city generator
//! - `spawn`: spawn strategies
//! - `session`: player mapping and per-event deliveries
//! - `client_manager`: open connections and outbound fan-out
//! - `network`: listener, connection tasks and the session loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_address("0.0.0.0", 3000)?;
//!     let mut server = Server::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod mapgen;
pub mod network;
pub mod session;
pub mod spawn;
