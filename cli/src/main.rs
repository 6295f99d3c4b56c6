pub mod commands;

use clap::Parser;
use commands::Commands;
use shared::networking::master::MasterConfig;
use shared::networking::worker::WorkerConfig;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Master(args) => {
            let config = MasterConfig::new(
                args.workers,
                args.width.unwrap_or(800),
                args.height.unwrap_or(600),
                args.tile_size.unwrap_or(64),
                args.threads.unwrap_or(4),
                args.scene,
                args.output.unwrap_or_else(|| "render.png".to_string()),
                args.tile_timeout.unwrap_or(120),
                args.handshake_timeout.unwrap_or(10),
            );
            master::run_master(config).await;
        }
        Commands::Worker(args) => {
            let name = match &args.name {
                Some(name) => name.to_owned(),
                None => format!("worker-{}", Uuid::new_v4()),
            };
            let address = args.address.unwrap_or_else(|| "0.0.0.0".to_string());
            let port = args.port.unwrap_or(8787);

            let config = WorkerConfig::new(name, address, port);
            worker::run_worker(config).await;
        }
    }
}
