//! # Headless Game Client Library
//!
//! This library provides a client for the city shooter session server that
//! runs without a renderer. It speaks the same WebSocket protocol as the
//! browser client, mirrors the session from server events, and simulates
//! the local avatar with the same collision rules.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - `ClientWorld`: the map, the other players and their shots, kept current
//!   from `init`, `playerJoined`, `playerMoved`, `playerShot` and `playerLeft`
//! - `LocalPlayer`: first-person movement with gravity, jumping and per-axis
//!   collision against buildings and tree trunks
//! - `Weapon`: magazine and reload timer
//!
//! ### Network Module (`network`)
//! - `SessionClient`: WebSocket connection, JSON event encoding
//! - `Bot`: wanders the city, sends `move` every tick and shoots now and then
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::SessionClient;
//! use shared::{PlayerState, ServerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SessionClient::connect("ws://127.0.0.1:3000").await?;
//!
//!     if let ServerEvent::Init { id, players, .. } = session.next_event().await? {
//!         println!("joined as {} alongside {} players", id, players.len() - 1);
//!     }
//!
//!     session.send_move(PlayerState::new(10.0, 5.0, -3.0, 1.57)).await?;
//!     session.send_shoot().await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
