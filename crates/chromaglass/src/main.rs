mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Paths) => handle_paths_command(),
        None => run::run(cli.run),
    }
}

fn handle_paths_command() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Configuration directories:");
    println!("  config:      {}", paths.config_dir().display());
    println!("  cache:       {}", paths.cache_dir().display());
    println!("  config file: {}", paths.config_file().display());
    println!("  image cache: {}", paths.image_cache_dir().display());
    Ok(())
}
