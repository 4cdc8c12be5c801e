use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const PLAYER_SPEED: f64 = 15.0;
pub const JUMP_FORCE: f64 = 25.0;
pub const GRAVITY: f64 = 50.0;
pub const PLAYER_WIDTH: f64 = 1.0;
pub const PLAYER_HEIGHT: f64 = 2.0;
pub const BUILDING_FOOTPRINT: f64 = 8.0;
pub const TREE_TRUNK_WIDTH: f64 = 1.0;
pub const TREE_TRUNK_HEIGHT: f64 = 4.0;
pub const MAGAZINE_SIZE: u32 = 20;
pub const RELOAD_SECS: f64 = 2.0;

/// Opaque, server-assigned name of one client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// World position and yaw of one avatar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Yaw in radians.
    pub rotation: f64,
}

impl PlayerState {
    pub fn new(x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self { x, y, z, rotation }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.rotation.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    Barn,
    Skyscraper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub x: f64,
    pub z: f64,
    pub h: f64,
    #[serde(rename = "type")]
    pub kind: BuildingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub x: f64,
    pub z: f64,
}

/// Static obstacles shared by every client of one server process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldMap {
    pub buildings: Vec<Building>,
    pub trees: Vec<Tree>,
    /// Reserved for pickups; the generator never fills it.
    pub items: Vec<serde_json::Value>,
}

impl WorldMap {
    /// Collision boxes for every building and tree trunk, in map order.
    pub fn colliders(&self) -> Vec<Aabb> {
        let buildings = self.buildings.iter().map(|b| {
            Aabb::from_center_size(
                [b.x, b.h / 2.0, b.z],
                [BUILDING_FOOTPRINT, b.h, BUILDING_FOOTPRINT],
            )
        });
        let trunks = self.trees.iter().map(|t| {
            Aabb::from_center_size(
                [t.x, TREE_TRUNK_HEIGHT / 2.0, t.z],
                [TREE_TRUNK_WIDTH, TREE_TRUNK_HEIGHT, TREE_TRUNK_WIDTH],
            )
        });
        buildings.chain(trunks).collect()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn from_center_size(center: [f64; 3], size: [f64; 3]) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = center[axis] - size[axis] / 2.0;
            max[axis] = center[axis] + size[axis] / 2.0;
        }
        Self { min, max }
    }

    /// Touching faces count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && self.max[axis] >= other.min[axis])
    }
}

/// Box occupied by a player standing at `position`.
pub fn player_box(position: [f64; 3]) -> Aabb {
    Aabb::from_center_size(position, [PLAYER_WIDTH, PLAYER_HEIGHT, PLAYER_WIDTH])
}

pub fn check_collision(position: [f64; 3], colliders: &[Aabb]) -> bool {
    let player = player_box(position);
    colliders.iter().any(|c| player.intersects(c))
}

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Move(PlayerState),
    Shoot,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Init {
        id: ConnectionId,
        players: HashMap<ConnectionId, PlayerState>,
        map: Arc<WorldMap>,
    },
    PlayerJoined {
        id: ConnectionId,
        data: PlayerState,
    },
    PlayerMoved {
        id: ConnectionId,
        data: PlayerState,
    },
    PlayerShot {
        id: ConnectionId,
    },
    PlayerLeft(ConnectionId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Init { .. } => "init",
            ServerEvent::PlayerJoined { .. } => "playerJoined",
            ServerEvent::PlayerMoved { .. } => "playerMoved",
            ServerEvent::PlayerShot { .. } => "playerShot",
            ServerEvent::PlayerLeft(_) => "playerLeft",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("non-finite coordinates in move payload")]
    NonFinite,
    #[error("unsupported frame type: {0}")]
    UnsupportedFrame(&'static str),
}

pub fn encode<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let event: ClientEvent = serde_json::from_str(text)?;
    if let ClientEvent::Move(state) = &event {
        if !state.is_finite() {
            return Err(ProtocolError::NonFinite);
        }
    }
    Ok(event)
}

pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
