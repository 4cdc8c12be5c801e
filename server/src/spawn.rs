//! Spawn placement for joining players

use crate::config::{SpawnConfig, SpawnStrategy, WorldConfig};
use log::warn;
use rand::Rng;
use shared::{PlayerState, WorldMap};

/// Result of a spawn search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnOutcome {
    /// A sampled position clear of every obstacle.
    Clear(PlayerState),
    /// Every attempt was obstructed; the player drops in from the configured
    /// fallback point instead.
    Fallback(PlayerState),
    /// The fixed-origin strategy is configured.
    Fixed(PlayerState),
}

impl SpawnOutcome {
    /// The chosen state, whichever branch produced it.
    pub fn state(&self) -> PlayerState {
        match *self {
            SpawnOutcome::Clear(state)
            | SpawnOutcome::Fallback(state)
            | SpawnOutcome::Fixed(state) => state,
        }
    }
}

/// Picks a spawn according to the configured strategy.
pub fn choose_spawn<R: Rng + ?Sized>(
    map: &WorldMap,
    world: &WorldConfig,
    config: &SpawnConfig,
    rng: &mut R,
) -> SpawnOutcome {
    match config.strategy {
        SpawnStrategy::SafeSearch => safe_spawn(map, world, config, rng),
        SpawnStrategy::FixedOrigin => SpawnOutcome::Fixed(config.fixed_point),
    }
}

/// Rejection-samples a position clear of buildings and trees.
///
/// Obstacle checks are axis-aligned boxes around each obstacle centre.
/// With a crowded map the attempt budget may run out even though free
/// ground exists; the fallback is returned in that case.
pub fn safe_spawn<R: Rng + ?Sized>(
    map: &WorldMap,
    world: &WorldConfig,
    config: &SpawnConfig,
    rng: &mut R,
) -> SpawnOutcome {
    let span = world.span as f64;
    let extent = span - 2.0 * config.margin;
    let offset = span / 2.0 - config.margin;

    for _ in 0..config.max_attempts {
        let x = rng.gen::<f64>() * extent - offset;
        let z = rng.gen::<f64>() * extent - offset;

        if is_clear(map, config, x, z) {
            return SpawnOutcome::Clear(PlayerState::new(x, config.spawn_height, z, 0.0));
        }
    }

    warn!(
        "No clear spawn after {} attempts, falling back to ({}, {}, {})",
        config.max_attempts, config.fallback.x, config.fallback.y, config.fallback.z
    );
    SpawnOutcome::Fallback(config.fallback)
}

/// True when `(x, z)` is outside every obstacle's clearance box.
pub fn is_clear(map: &WorldMap, config: &SpawnConfig, x: f64, z: f64) -> bool {
    let near = |ox: f64, oz: f64, clearance: f64| {
        (x - ox).abs() < clearance && (z - oz).abs() < clearance
    };

    !map
        .buildings
        .iter()
        .any(|b| near(b.x, b.z, config.building_clearance))
        && !map.trees.iter().any(|t| near(t.x, t.z, config.tree_clearance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::generate_city;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{Building, BuildingKind, Tree};

    /// Obstacles on every 2-unit grid point, so no sample can be clear.
    fn saturated_map(world: &WorldConfig) -> WorldMap {
        let half = world.span as i64 / 2;
        let mut buildings = Vec::new();
        for x in (-half..=half).step_by(2) {
            for z in (-half..=half).step_by(2) {
                buildings.push(Building {
                    x: x as f64,
                    z: z as f64,
                    h: 20.0,
                    kind: BuildingKind::Skyscraper,
                });
            }
        }
        WorldMap {
            buildings,
            trees: Vec::new(),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_spawn_on_empty_map_is_clear() {
        let world = WorldConfig::default();
        let config = SpawnConfig::default();
        let outcome = safe_spawn(
            &WorldMap::default(),
            &world,
            &config,
            &mut StdRng::seed_from_u64(1),
        );

        match outcome {
            SpawnOutcome::Clear(state) => {
                assert_eq!(state.y, config.spawn_height);
                assert_eq!(state.rotation, 0.0);
                assert!(state.x >= -240.0 && state.x < 240.0);
                assert!(state.z >= -240.0 && state.z < 240.0);
            }
            other => panic!("Expected a clear spawn, got {:?}", other),
        }
    }

    #[test]
    fn test_spawn_never_inside_clearance() {
        let world = WorldConfig::default();
        let config = SpawnConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let map = generate_city(&world, &mut rng).unwrap();
            let outcome = safe_spawn(&map, &world, &config, &mut rng);
            let state = outcome.state();

            if let SpawnOutcome::Fallback(_) = outcome {
                assert_eq!(state, config.fallback);
                continue;
            }

            for b in &map.buildings {
                assert!(!((state.x - b.x).abs() < 6.0 && (state.z - b.z).abs() < 6.0));
            }
            for t in &map.trees {
                assert!(!((state.x - t.x).abs() < 2.0 && (state.z - t.z).abs() < 2.0));
            }
        }
    }

    #[test]
    fn test_saturated_map_falls_back() {
        let world = WorldConfig::default();
        let config = SpawnConfig::default();
        let map = saturated_map(&world);

        let outcome = safe_spawn(&map, &world, &config, &mut StdRng::seed_from_u64(9));
        assert_eq!(
            outcome,
            SpawnOutcome::Fallback(PlayerState::new(0.0, 50.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_zero_attempts_falls_back() {
        let world = WorldConfig::default();
        let config = SpawnConfig {
            max_attempts: 0,
            ..SpawnConfig::default()
        };
        let outcome = safe_spawn(
            &WorldMap::default(),
            &world,
            &config,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(outcome, SpawnOutcome::Fallback(_)));
    }

    #[test]
    fn test_fixed_origin_strategy() {
        let world = WorldConfig::default();
        let config = SpawnConfig {
            strategy: SpawnStrategy::FixedOrigin,
            ..SpawnConfig::default()
        };
        let map = saturated_map(&world);

        let outcome = choose_spawn(&map, &world, &config, &mut StdRng::seed_from_u64(0));
        assert_eq!(outcome, SpawnOutcome::Fixed(config.fixed_point));
    }

    #[test]
    fn test_clearance_is_box_not_circle() {
        let config = SpawnConfig::default();
        let map = WorldMap {
            buildings: vec![Building {
                x: 0.0,
                z: 0.0,
                h: 30.0,
                kind: BuildingKind::Barn,
            }],
            trees: vec![Tree { x: 100.0, z: 100.0 }],
            items: Vec::new(),
        };

        // Euclidean distance ~7.8, but inside the 6-unit box on both axes.
        assert!(!is_clear(&map, &config, 5.5, 5.5));
        assert!(is_clear(&map, &config, 6.0, 0.0));
        assert!(!is_clear(&map, &config, 101.5, 98.5));
        assert!(is_clear(&map, &config, 102.0, 100.0));
    }
}
