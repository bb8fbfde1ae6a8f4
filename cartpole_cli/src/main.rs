mod app;
mod cli;

use clap::Parser;
use eyre::Result;

use crate::cli::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let cfg = app::load_config(cli.config.as_deref())?;
    cfg.validate()?;
    app::init_logging(&cli, &cfg.logging)?;

    app::run(&cli, &cfg)
}
