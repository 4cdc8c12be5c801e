//! Server configuration: bind address, world generation and spawn policy
//!
//! Every constant the map generator and spawn search use lives here so it
//! can be overridden from the command line. The defaults reproduce the
//! classic 500x500 city.

use shared::PlayerState;
use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;

/// Upper bound on scanned grid cells, so a bad span or step cannot stall startup.
pub const MAX_GRID_CELLS: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
    #[error("invalid world configuration: {0}")]
    World(#[from] MapGenerationError),
    #[error("invalid spawn configuration: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapGenerationError {
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("building height range {min}..{max} is invalid")]
    HeightRange { min: f64, max: f64 },
    #[error("grid of {cells} cells exceeds the limit of {max}")]
    TooManyCells { cells: u64, max: u64 },
}

/// Grid scan parameters for the city generator.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Side length of the square map in world units.
    pub span: u32,
    /// Distance between scanned grid cells.
    pub step: u32,
    pub block_size: u32,
    /// Cells with `|coord| % block_size` below this are road.
    pub road_width: u32,
    /// Buildings only sit on cells where both coordinates are multiples of this.
    pub lot_alignment: u32,
    pub tree_probability: f64,
    pub building_probability: f64,
    pub barn_probability: f64,
    pub height_min: f64,
    pub height_max: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            span: 500,
            step: 10,
            block_size: 50,
            road_width: 20,
            lot_alignment: 20,
            tree_probability: 0.05,
            building_probability: 0.2,
            barn_probability: 0.2,
            height_min: 20.0,
            height_max: 80.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), MapGenerationError> {
        for (name, value) in [
            ("span", self.span),
            ("step", self.step),
            ("block_size", self.block_size),
            ("lot_alignment", self.lot_alignment),
        ] {
            if value == 0 {
                return Err(MapGenerationError::ZeroSize(name));
            }
        }

        let per_side = (self.span as u64 + self.step as u64 - 1) / self.step as u64;
        let cells = per_side * per_side;
        if cells > MAX_GRID_CELLS {
            return Err(MapGenerationError::TooManyCells {
                cells,
                max: MAX_GRID_CELLS,
            });
        }

        for (name, value) in [
            ("tree_probability", self.tree_probability),
            ("building_probability", self.building_probability),
            ("barn_probability", self.barn_probability),
        ] {
            // NaN fails the range check as well.
            if !(0.0..=1.0).contains(&value) {
                return Err(MapGenerationError::Probability { name, value });
            }
        }

        if !self.height_min.is_finite()
            || !self.height_max.is_finite()
            || self.height_min < 0.0
            || self.height_min > self.height_max
        {
            return Err(MapGenerationError::HeightRange {
                min: self.height_min,
                max: self.height_max,
            });
        }

        Ok(())
    }
}

/// How a joining player's initial state is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SpawnStrategy {
    /// Rejection-sample a spot clear of buildings and trees.
    SafeSearch,
    /// Put everyone on `SpawnConfig::fixed_point`.
    FixedOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    pub strategy: SpawnStrategy,
    pub max_attempts: u32,
    /// Distance kept from the map edge when sampling.
    pub margin: f64,
    pub building_clearance: f64,
    pub tree_clearance: f64,
    /// Height above ground for a successful sample.
    pub spawn_height: f64,
    /// Returned when every attempt was obstructed.
    pub fallback: PlayerState,
    pub fixed_point: PlayerState,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            strategy: SpawnStrategy::SafeSearch,
            max_attempts: 50,
            margin: 10.0,
            building_clearance: 6.0,
            tree_clearance: 2.0,
            spawn_height: 5.0,
            fallback: PlayerState::new(0.0, 50.0, 0.0, 0.0),
            fixed_point: PlayerState::new(0.0, 5.0, 0.0, 0.0),
        }
    }
}

impl SpawnConfig {
    pub fn validate(&self, world: &WorldConfig) -> Result<(), ConfigError> {
        let half_span = world.span as f64 / 2.0;
        if !self.margin.is_finite() || self.margin < 0.0 || self.margin >= half_span {
            return Err(ConfigError::Spawn(format!(
                "margin {} must be in [0, {})",
                self.margin, half_span
            )));
        }
        for (name, value) in [
            ("building_clearance", self.building_clearance),
            ("tree_clearance", self.tree_clearance),
            ("spawn_height", self.spawn_height),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Spawn(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.fallback.is_finite() || !self.fixed_point.is_finite() {
            return Err(ConfigError::Spawn(
                "fallback and fixed spawn points must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// `None` accepts any number of connections.
    pub max_clients: Option<usize>,
    /// Seeds map generation and spawn sampling. `None` uses entropy.
    pub seed: Option<u64>,
    pub world: WorldConfig,
    pub spawn: SpawnConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_clients: None,
            seed: None,
            world: WorldConfig::default(),
            spawn: SpawnConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_address(host: &str, port: u16) -> Result<Self, ConfigError> {
        let address = format!("{}:{}", host, port);
        let bind_addr = address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(address))?;
        Ok(Self {
            bind_addr,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.spawn.validate(&self.world)?;
        Ok(())
    }
}
