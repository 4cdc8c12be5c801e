use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, SpawnStrategy, DEFAULT_PORT};
use server::network::Server;

/// Session server for the multiplayer city shooter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Refuse connections beyond this many (unlimited when unset)
    #[arg(long)]
    max_clients: Option<usize>,

    /// Seed for map generation and spawn sampling
    #[arg(long)]
    seed: Option<u64>,

    /// How joining players are placed
    #[arg(long, value_enum, default_value_t = SpawnStrategy::SafeSearch)]
    spawn_strategy: SpawnStrategy,

    /// Spawn search attempts before falling back
    #[arg(long, default_value_t = 50)]
    spawn_attempts: u32,

    /// Side length of the square map
    #[arg(long, default_value_t = 500)]
    map_span: u32,

    /// Grid scan step
    #[arg(long, default_value_t = 10)]
    grid_step: u32,

    /// City block size
    #[arg(long, default_value_t = 50)]
    block_size: u32,

    /// Road width at each block edge
    #[arg(long, default_value_t = 20)]
    road_width: u32,

    /// Chance of a tree on a road cell
    #[arg(long, default_value_t = 0.05)]
    tree_probability: f64,

    /// Chance of a building on an aligned lot
    #[arg(long, default_value_t = 0.2)]
    building_probability: f64,

    /// Chance a building is a barn rather than a skyscraper
    #[arg(long, default_value_t = 0.2)]
    barn_probability: f64,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = ServerConfig::with_address(&self.host, self.port)?;
        config.max_clients = self.max_clients;
        config.seed = self.seed;

        config.world.span = self.map_span;
        config.world.step = self.grid_step;
        config.world.block_size = self.block_size;
        config.world.road_width = self.road_width;
        config.world.tree_probability = self.tree_probability;
        config.world.building_probability = self.building_probability;
        config.world.barn_probability = self.barn_probability;

        config.spawn.strategy = self.spawn_strategy;
        config.spawn.max_attempts = self.spawn_attempts;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = Args::parse().into_config()?;
    info!(
        "Starting server on {} (spawn strategy: {:?})",
        config.bind_addr, config.spawn.strategy
    );

    let mut server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
