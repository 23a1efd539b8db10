use clap::Parser;
use log::error;

use vendorfetch::{
    cli::args::{CliArgs, Command},
    config::VendorfetchConfig,
    Vendorfetch,
};

fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = VendorfetchConfig::load()?;

    let mut builder = Vendorfetch::builder().recipe_dir(args.recipe_dir);
    if let Some(root) = args.root {
        builder = builder.root(root);
    }
    if let Some(cache_dir) = args.cache_dir.or(config.cache_dir) {
        builder = builder.cache_dir(cache_dir);
    }
    let vendorfetch = builder.try_build()?;

    match args.cmd {
        Command::Update { names } => vendorfetch.update(&names),
        Command::ClearCache => vendorfetch.clear_cache(),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}
