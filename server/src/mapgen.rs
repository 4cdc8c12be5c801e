//! Procedural city generation
//!
//! The map is a square grid scanned cell by cell. Cells near block edges are
//! roads that may grow a tree; aligned interior cells may hold a building.
//! Every placement is an independent draw, so density stays comparable for
//! any map span.

use crate::config::{MapGenerationError, WorldConfig};
use log::info;
use rand::Rng;
use shared::{Building, BuildingKind, Tree, WorldMap};

/// Generates a city layout from `config` using `rng` for every draw.
///
/// The scan order is fixed, so the same config and an identically seeded
/// generator always produce the same map.
pub fn generate_city<R: Rng + ?Sized>(
    config: &WorldConfig,
    rng: &mut R,
) -> Result<WorldMap, MapGenerationError> {
    config.validate()?;

    let half = (config.span / 2) as i64;
    let step = config.step as usize;
    let block = config.block_size as i64;
    let road = config.road_width as i64;
    let lot = config.lot_alignment as i64;

    let mut buildings = Vec::new();
    let mut trees = Vec::new();

    for x in (-half..half).step_by(step) {
        for z in (-half..half).step_by(step) {
            let is_road = x.abs() % block < road || z.abs() % block < road;

            if is_road {
                if rng.gen::<f64>() < config.tree_probability {
                    trees.push(Tree {
                        x: x as f64,
                        z: z as f64,
                    });
                }
                continue;
            }

            if x.abs() % lot != 0 || z.abs() % lot != 0 {
                continue;
            }

            if rng.gen::<f64>() < config.building_probability {
                let h = config.height_min + rng.gen::<f64>() * (config.height_max - config.height_min);
                let kind = if rng.gen::<f64>() < config.barn_probability {
                    BuildingKind::Barn
                } else {
                    BuildingKind::Skyscraper
                };
                buildings.push(Building {
                    x: x as f64,
                    z: z as f64,
                    h,
                    kind,
                });
            }
        }
    }

    info!(
        "Generated city: {} buildings, {} trees over {}x{} units",
        buildings.len(),
        trees.len(),
        config.span,
        config.span
    );

    Ok(WorldMap {
        buildings,
        trees,
        items: Vec::new(),
    })
}
