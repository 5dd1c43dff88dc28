use anyhow::Result;
use clap::Parser;

use isotrack_cli::{commands, logging, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    match &cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli),
        Commands::Search(args) => commands::search::execute(args, &cli),
        Commands::Restore(args) => commands::restore::execute(args, &cli),
        Commands::CheckConfig(args) => commands::check_config::execute(args, &cli),
    }
}
