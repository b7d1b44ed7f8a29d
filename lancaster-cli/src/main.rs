mod cli;
mod download;
mod inspect;
mod serve;
mod specs;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Download(cmd) => download::run(&cli, cmd).await,
        Commands::Serve(cmd) => serve::run(&cli, cmd).await,
        Commands::Id(cmd) => inspect::run_id(cmd),
        Commands::Ls(cmd) => inspect::run_ls(cmd),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
