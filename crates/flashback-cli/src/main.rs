use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod input;
mod logging;

use cli::{Cli, Commands};
use commands::{Context, capture, migrate, search, setup};

fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let ctx = logging::with_startup_logging(|| Context::load(&cli.global))?;
    logging::init(&ctx.config.log)?;

    match &cli.command {
        Commands::Setup(args) => setup::run(&ctx, args),
        Commands::Migrate => migrate::migrate(&ctx),
        Commands::Rollback(args) => migrate::rollback(&ctx, args),
        Commands::Status => migrate::status(&ctx),
        Commands::Capture(args) => capture::run(&ctx, args),
        Commands::Search(args) => search::search(&ctx, args),
        Commands::Delete(args) => search::delete(&ctx, args),
    }
}
