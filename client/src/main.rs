use clap::Parser;
use client::network::Bot;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:3000")]
    url: String,

    /// Milliseconds between movement updates
    #[arg(short = 't', long, default_value = "16")]
    tick_ms: u64,

    /// Leave after this many seconds (stay until disconnected when unset)
    #[arg(short = 'd', long)]
    duration_secs: Option<u64>,

    /// Seed for the bot's wandering
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting bot...");
    info!("Connecting to: {}", args.url);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let bot = Bot::join(&args.url, Duration::from_millis(args.tick_ms.max(1)), rng).await?;
    let duration = args.duration_secs.map(Duration::from_secs);

    tokio::select! {
        result = bot.run(duration) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, leaving..."),
    }

    Ok(())
}
