//! Client-side game state: the mirrored session, local movement and weapon

use log::{debug, warn};
use shared::{
    check_collision, Aabb, ConnectionId, PlayerState, ServerEvent, WorldMap, GRAVITY, JUMP_FORCE,
    MAGAZINE_SIZE, PLAYER_SPEED, RELOAD_SECS,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The client's view of the session, kept current from server events.
#[derive(Debug, Default)]
pub struct ClientWorld {
    pub my_id: Option<ConnectionId>,
    /// Everyone except this client.
    pub others: HashMap<ConnectionId, PlayerState>,
    pub map: Arc<WorldMap>,
    pub colliders: Vec<Aabb>,
    /// Where the server placed this client on join.
    pub spawn: Option<PlayerState>,
    /// Shots seen per remote player.
    pub shots: HashMap<ConnectionId, u32>,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.my_id.is_some()
    }

    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Init { id, players, map } => {
                self.colliders = map.colliders();
                self.map = map;
                self.others.clear();
                self.spawn = players.get(&id).copied();
                for (player_id, state) in players {
                    if player_id != id {
                        self.others.insert(player_id, state);
                    }
                }
                debug!(
                    "Joined as {} with {} other players, {} colliders",
                    id,
                    self.others.len(),
                    self.colliders.len()
                );
                self.my_id = Some(id);
            }

            ServerEvent::PlayerJoined { id, data } => {
                self.others.insert(id, data);
            }

            ServerEvent::PlayerMoved { id, data } => {
                if let Some(state) = self.others.get_mut(&id) {
                    *state = data;
                } else {
                    warn!("Move for unknown player {}", id);
                }
            }

            ServerEvent::PlayerShot { id } => {
                *self.shots.entry(id).or_insert(0) += 1;
            }

            ServerEvent::PlayerLeft(id) => {
                self.others.remove(&id);
                self.shots.remove(&id);
            }
        }
    }
}

/// Movement keys held during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// The locally simulated avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub rotation: f64,
    pub can_jump: bool,
}

impl LocalPlayer {
    pub fn from_state(state: PlayerState) -> Self {
        Self {
            position: [state.x, state.y, state.z],
            velocity: [0.0; 3],
            rotation: state.rotation,
            can_jump: false,
        }
    }

    pub fn state(&self) -> PlayerState {
        PlayerState::new(
            self.position[0],
            self.position[1],
            self.position[2],
            self.rotation,
        )
    }

    /// Turns by `delta` radians around the vertical axis.
    pub fn turn(&mut self, delta: f64) {
        self.rotation += delta;
    }

    /// Advances one frame. Each axis moves separately and is undone if it
    /// ends inside a collider, so the player slides along walls.
    pub fn step(&mut self, input: &MoveInput, dt: f64, colliders: &[Aabb]) {
        let mut dir_x: f64 = 0.0;
        let mut dir_z: f64 = 0.0;
        if input.forward {
            dir_z -= 1.0;
        }
        if input.back {
            dir_z += 1.0;
        }
        if input.left {
            dir_x -= 1.0;
        }
        if input.right {
            dir_x += 1.0;
        }

        let length: f64 = (dir_x * dir_x + dir_z * dir_z).sqrt();
        if length > 0.0 {
            dir_x /= length;
            dir_z /= length;
        }

        // Rotate the input direction by the yaw.
        let (sin, cos) = self.rotation.sin_cos();
        let world_x = dir_x * cos + dir_z * sin;
        let world_z = -dir_x * sin + dir_z * cos;

        self.velocity[0] = world_x * PLAYER_SPEED;
        self.velocity[2] = world_z * PLAYER_SPEED;
        self.velocity[1] -= GRAVITY * dt;

        if input.jump && self.can_jump {
            self.velocity[1] = JUMP_FORCE;
            self.can_jump = false;
        }

        self.position[0] += self.velocity[0] * dt;
        if check_collision(self.position, colliders) {
            self.position[0] -= self.velocity[0] * dt;
        }

        self.position[2] += self.velocity[2] * dt;
        if check_collision(self.position, colliders) {
            self.position[2] -= self.velocity[2] * dt;
        }

        self.position[1] += self.velocity[1] * dt;

        if self.position[1] < 0.0 {
            self.position[1] = 0.0;
            self.velocity[1] = 0.0;
            self.can_jump = true;
        }

        if check_collision(self.position, colliders) {
            self.position[1] -= self.velocity[1] * dt;
            // Falling onto a roof counts as landing.
            if self.velocity[1] < 0.0 {
                self.can_jump = true;
            }
            self.velocity[1] = 0.0;
        }
    }
}

/// Magazine and reload timer.
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub ammo: u32,
    reload_remaining: Option<f64>,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            ammo: MAGAZINE_SIZE,
            reload_remaining: None,
        }
    }
}

impl Weapon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_remaining.is_some()
    }

    /// Spends a round. Returns false when empty or reloading.
    pub fn try_shoot(&mut self) -> bool {
        if self.is_reloading() || self.ammo == 0 {
            return false;
        }
        self.ammo -= 1;
        true
    }

    /// Starts a reload unless one is running or the magazine is full.
    pub fn start_reload(&mut self) -> bool {
        if self.is_reloading() || self.ammo == MAGAZINE_SIZE {
            return false;
        }
        self.reload_remaining = Some(RELOAD_SECS);
        true
    }

    pub fn update(&mut self, dt: f64) {
        if let Some(remaining) = self.reload_remaining {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.ammo = MAGAZINE_SIZE;
                self.reload_remaining = None;
            } else {
                self.reload_remaining = Some(remaining);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Building, BuildingKind, Tree};
    use std::f64::consts::FRAC_PI_2;

    fn id(name: &str) -> ConnectionId {
        ConnectionId::new(name)
    }

    fn one_building_map() -> WorldMap {
        WorldMap {
            buildings: vec![Building {
                x: 10.0,
                z: 0.0,
                h: 20.0,
                kind: BuildingKind::Skyscraper,
            }],
            trees: vec![Tree { x: -10.0, z: 0.0 }],
            items: Vec::new(),
        }
    }

    fn init_event(me: &str, others: &[&str]) -> ServerEvent {
        let mut players = HashMap::new();
        players.insert(id(me), PlayerState::new(1.0, 5.0, 1.0, 0.0));
        for other in others {
            players.insert(id(other), PlayerState::default());
        }
        ServerEvent::Init {
            id: id(me),
            players,
            map: Arc::new(one_building_map()),
        }
    }

    #[test]
    fn test_init_populates_world() {
        let mut world = ClientWorld::new();
        assert!(!world.is_initialized());

        world.apply(init_event("me", &["a", "b"]));

        assert_eq!(world.my_id, Some(id("me")));
        assert_eq!(world.others.len(), 2);
        assert!(!world.others.contains_key(&id("me")));
        assert_eq!(world.spawn, Some(PlayerState::new(1.0, 5.0, 1.0, 0.0)));
        assert_eq!(world.colliders.len(), 2);
    }

    #[test]
    fn test_join_move_leave() {
        let mut world = ClientWorld::new();
        world.apply(init_event("me", &[]));

        world.apply(ServerEvent::PlayerJoined {
            id: id("a"),
            data: PlayerState::default(),
        });
        let moved = PlayerState::new(10.0, 5.0, -3.0, 1.57);
        world.apply(ServerEvent::PlayerMoved {
            id: id("a"),
            data: moved,
        });
        assert_eq!(world.others.get(&id("a")), Some(&moved));

        world.apply(ServerEvent::PlayerShot { id: id("a") });
        world.apply(ServerEvent::PlayerShot { id: id("a") });
        assert_eq!(world.shots.get(&id("a")), Some(&2));

        world.apply(ServerEvent::PlayerLeft(id("a")));
        assert!(world.others.is_empty());
        assert!(world.shots.is_empty());
    }

    #[test]
    fn test_move_for_unknown_player_ignored() {
        let mut world = ClientWorld::new();
        world.apply(init_event("me", &[]));
        world.apply(ServerEvent::PlayerMoved {
            id: id("ghost"),
            data: PlayerState::default(),
        });
        assert!(world.others.is_empty());
    }

    #[test]
    fn test_walk_forward_moves_negative_z() {
        let mut player = LocalPlayer::from_state(PlayerState::new(0.0, 0.0, 50.0, 0.0));
        let input = MoveInput {
            forward: true,
            ..MoveInput::default()
        };
        player.step(&input, 0.1, &[]);

        assert_approx_eq!(player.position[0], 0.0);
        assert_approx_eq!(player.position[2], 50.0 - PLAYER_SPEED * 0.1);
    }

    #[test]
    fn test_yaw_rotates_movement() {
        let mut player = LocalPlayer::from_state(PlayerState::new(0.0, 0.0, 0.0, FRAC_PI_2));
        let input = MoveInput {
            forward: true,
            ..MoveInput::default()
        };
        player.step(&input, 0.1, &[]);

        // Facing +90 degrees, forward is -x.
        assert_approx_eq!(player.position[0], -PLAYER_SPEED * 0.1);
        assert_approx_eq!(player.position[2], 0.0);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let mut player = LocalPlayer::from_state(PlayerState::default());
        let input = MoveInput {
            forward: true,
            right: true,
            ..MoveInput::default()
        };
        player.step(&input, 0.1, &[]);

        let dx = player.position[0];
        let dz = player.position[2];
        assert_approx_eq!((dx * dx + dz * dz).sqrt(), PLAYER_SPEED * 0.1);
    }

    #[test]
    fn test_wall_blocks_horizontal_motion() {
        let colliders = one_building_map().colliders();
        // Building spans x 6..14; player half-width 0.5.
        let mut player = LocalPlayer::from_state(PlayerState::new(5.4, 0.0, 0.0, 0.0));
        let input = MoveInput {
            right: true,
            ..MoveInput::default()
        };
        player.step(&input, 0.1, &colliders);

        assert_approx_eq!(player.position[0], 5.4);
    }

    #[test]
    fn test_gravity_and_ground() {
        let mut player = LocalPlayer::from_state(PlayerState::new(100.0, 5.0, 100.0, 0.0));
        for _ in 0..200 {
            player.step(&MoveInput::default(), 0.016, &[]);
        }
        assert_eq!(player.position[1], 0.0);
        assert!(player.can_jump);

        let jump = MoveInput {
            jump: true,
            ..MoveInput::default()
        };
        player.step(&jump, 0.016, &[]);
        assert!(player.position[1] > 0.0);
        assert!(!player.can_jump);
    }

    #[test]
    fn test_land_on_roof() {
        let colliders = one_building_map().colliders();
        let mut player = LocalPlayer::from_state(PlayerState::new(10.0, 21.5, 0.0, 0.0));
        for _ in 0..20 {
            player.step(&MoveInput::default(), 0.016, &colliders);
        }
        assert!(player.position[1] > 20.0);
        assert!(player.can_jump);
    }

    #[test]
    fn test_weapon_magazine_and_reload() {
        let mut weapon = Weapon::new();
        assert!(!weapon.start_reload());

        for _ in 0..MAGAZINE_SIZE {
            assert!(weapon.try_shoot());
        }
        assert!(!weapon.try_shoot());
        assert_eq!(weapon.ammo, 0);

        assert!(weapon.start_reload());
        assert!(!weapon.start_reload());
        assert!(!weapon.try_shoot());

        weapon.update(1.0);
        assert!(weapon.is_reloading());
        weapon.update(1.0);
        assert!(!weapon.is_reloading());
        assert_eq!(weapon.ammo, MAGAZINE_SIZE);
        assert!(weapon.try_shoot());
    }
}
