//! Authoritative session state and event relay
//!
//! `Session` is the single writer of the player mapping and the world map
//! cache. Each handler applies its mutation and returns the deliveries the
//! network layer must fan out, so a handler never observes a half-applied
//! update from another connection.

use crate::config::{MapGenerationError, ServerConfig, SpawnConfig, WorldConfig};
use crate::mapgen::generate_city;
use crate::spawn::{choose_spawn, SpawnOutcome};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ConnectionId, PlayerState, ServerEvent, WorldMap};
use std::collections::HashMap;
use std::sync::Arc;

/// Who receives an outgoing event.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipients {
    Only(ConnectionId),
    AllExcept(ConnectionId),
    All,
}

/// One event and the connections it goes to
///
/// Produced by the session handlers and consumed by the connection
/// registry, which resolves `to` into per-connection queues.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Outgoing {
    fn only(id: &ConnectionId, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Only(id.clone()),
            event,
        }
    }

    fn others(id: &ConnectionId, event: ServerEvent) -> Self {
        Self {
            to: Recipients::AllExcept(id.clone()),
            event,
        }
    }
}

/// The shared session: every active player's last reported state and the
/// city they play in.
///
/// Only the server loop holds a `Session`, so handlers take `&mut self` and
/// need no locking.
pub struct Session {
    players: HashMap<ConnectionId, PlayerState>,
    world: Option<Arc<WorldMap>>,
    world_config: WorldConfig,
    spawn_config: SpawnConfig,
    rng: StdRng,
}

impl Session {
    /// Creates an empty session. The map is generated on the first join.
    pub fn new(world_config: WorldConfig, spawn_config: SpawnConfig, rng: StdRng) -> Self {
        Self {
            players: HashMap::new(),
            world: None,
            world_config,
            spawn_config,
            rng,
        }
    }

    /// Builds a session from server settings, seeding the generator when
    /// `config.seed` is set.
    pub fn from_config(config: &ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config.world.clone(), config.spawn.clone(), rng)
    }

    /// Returns the shared map, generating it on first use.
    pub fn world(&mut self) -> Result<Arc<WorldMap>, MapGenerationError> {
        if let Some(world) = &self.world {
            return Ok(Arc::clone(world));
        }

        info!("Generating new map...");
        let world = Arc::new(generate_city(&self.world_config, &mut self.rng)?);
        self.world = Some(Arc::clone(&world));
        Ok(world)
    }

    /// Drops the cached map; the next join generates a fresh one.
    pub fn clear_world(&mut self) {
        self.world = None;
    }

    /// Activates a new connection: spawns it and produces its `init`
    /// snapshot plus the join notice for everyone else.
    pub fn join(&mut self, id: &ConnectionId) -> Result<Vec<Outgoing>, MapGenerationError> {
        let world = self.world()?;

        let outcome = choose_spawn(&world, &self.world_config, &self.spawn_config, &mut self.rng);
        let state = outcome.state();
        match outcome {
            SpawnOutcome::Fallback(_) => info!("Player {} spawns from fallback point", id),
            _ => debug!(
                "Player {} spawns at ({:.1}, {:.1}, {:.1})",
                id, state.x, state.y, state.z
            ),
        }

        self.players.insert(id.clone(), state);

        Ok(vec![
            Outgoing::only(
                id,
                ServerEvent::Init {
                    id: id.clone(),
                    players: self.players.clone(),
                    map: world,
                },
            ),
            Outgoing::others(
                id,
                ServerEvent::PlayerJoined {
                    id: id.clone(),
                    data: state,
                },
            ),
        ])
    }

    /// Replaces the stored state for `id` with `state` verbatim.
    ///
    /// Later moves always win; there is no sequencing. Ids that are not
    /// active produce nothing.
    pub fn apply_move(&mut self, id: &ConnectionId, state: PlayerState) -> Vec<Outgoing> {
        match self.players.get_mut(id) {
            Some(stored) => {
                *stored = state;
                vec![Outgoing::others(
                    id,
                    ServerEvent::PlayerMoved {
                        id: id.clone(),
                        data: state,
                    },
                )]
            }
            None => Vec::new(),
        }
    }

    /// Relays a shot to everyone else.
    ///
    /// Shots carry no state and are not validated. Ids that are not active
    /// produce nothing.
    pub fn shoot(&mut self, id: &ConnectionId) -> Vec<Outgoing> {
        if !self.players.contains_key(id) {
            return Vec::new();
        }
        vec![Outgoing::others(
            id,
            ServerEvent::PlayerShot { id: id.clone() },
        )]
    }

    /// Forgets a departed player and tells everyone still connected.
    ///
    /// Leaving twice is harmless; the second call produces nothing.
    pub fn leave(&mut self, id: &ConnectionId) -> Vec<Outgoing> {
        if self.players.remove(id).is_none() {
            return Vec::new();
        }
        vec![Outgoing {
            to: Recipients::All,
            event: ServerEvent::PlayerLeft(id.clone()),
        }]
    }

    /// Last reported state of one active player.
    pub fn player(&self, id: &ConnectionId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Every active player, as sent in `init` snapshots.
    pub fn players(&self) -> &HashMap<ConnectionId, PlayerState> {
        &self.players
    }

    /// Number of active players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
