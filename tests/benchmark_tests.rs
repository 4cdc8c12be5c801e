//! Performance benchmarks for critical session systems

use client::game::{LocalPlayer, MoveInput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{SpawnConfig, WorldConfig};
use server::mapgen::generate_city;
use server::session::Session;
use server::spawn::safe_spawn;
use shared::{check_collision, decode_client_event, encode, ClientEvent, ConnectionId, PlayerState};
use std::time::Instant;

/// Benchmarks city generation at the default map size
#[test]
fn benchmark_city_generation() {
    let config = WorldConfig::default();
    let iterations = 100;
    let start = Instant::now();

    for seed in 0..iterations {
        let mut rng = StdRng::seed_from_u64(seed);
        let map = generate_city(&config, &mut rng).unwrap();
        assert!(!map.buildings.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "City generation: {} maps in {:?} ({:.2} μs/map)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks spawn search against a generated city
#[test]
fn benchmark_safe_spawn() {
    let world = WorldConfig::default();
    let spawn = SpawnConfig::default();
    let mut rng = StdRng::seed_from_u64(9);
    let map = generate_city(&world, &mut rng).unwrap();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let outcome = safe_spawn(&map, &world, &spawn, &mut rng);
        assert!(outcome.state().is_finite());
    }

    let duration = start.elapsed();
    println!(
        "Spawn search: {} spawns in {:?} ({:.2} μs/spawn)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks player collision checks against every obstacle on the map
#[test]
fn benchmark_collision_detection() {
    let mut rng = StdRng::seed_from_u64(4);
    let map = generate_city(&WorldConfig::default(), &mut rng).unwrap();
    let colliders = map.colliders();

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let x = (i % 500) as f64 - 250.0;
        let _ = check_collision([x, 1.0, 5.0], &colliders);
    }

    let duration = start.elapsed();
    println!(
        "Collision detection: {} checks over {} colliders in {:?}",
        iterations,
        colliders.len(),
        duration
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks local movement simulation at 60 frames per second
#[test]
fn benchmark_local_movement() {
    let mut rng = StdRng::seed_from_u64(5);
    let map = generate_city(&WorldConfig::default(), &mut rng).unwrap();
    let colliders = map.colliders();

    let mut player = LocalPlayer::from_state(PlayerState::new(0.0, 5.0, 0.0, 0.0));
    let input = MoveInput {
        forward: true,
        jump: true,
        ..Default::default()
    };

    let dt = 1.0 / 60.0;
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        player.step(&input, dt, &colliders);
    }

    let duration = start.elapsed();
    println!(
        "Local movement: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(player.state().is_finite());
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests move relay with a crowded session
#[test]
fn stress_test_move_fanout() {
    let mut session = Session::new(
        WorldConfig::default(),
        SpawnConfig::default(),
        StdRng::seed_from_u64(6),
    );
    let ids: Vec<ConnectionId> = (0..50).map(|i| ConnectionId::new(format!("p-{}", i))).collect();
    for id in &ids {
        session.join(id).unwrap();
    }

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = &ids[i % ids.len()];
        let outgoing = session.apply_move(id, PlayerState::new(i as f64, 0.0, 0.0, 0.0));
        assert_eq!(outgoing.len(), 1);
    }

    let duration = start.elapsed();
    println!(
        "Move relay: {} moves across {} players in {:?}",
        iterations,
        session.len(),
        duration
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks JSON encoding and decoding of move events
#[test]
fn benchmark_event_serialization() {
    let event = ClientEvent::Move(PlayerState::new(10.0, 5.0, -3.0, 1.57));

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let text = encode(&event).unwrap();
        let _decoded = decode_client_event(&text).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Event serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
