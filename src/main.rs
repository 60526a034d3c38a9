mod camera;
mod config;
mod headless;
mod players;
mod presence;
mod session;

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::process;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use tessera_sync::Authority;
use tessera_sync::transport::with_default_port;

use crate::config::{Cli, load_config};
use crate::session::Session;

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
        }
        Some(path) => {
            let cfg = simplelog::Config::default();
            CombinedLogger::init(vec![
                TermLogger::new(
                    LevelFilter::Info,
                    cfg.clone(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(LevelFilter::Debug, cfg, File::create(path)?),
            ])?;
        }
    }
    Ok(())
}

/// A panic on any thread ends the process with status 101.
fn install_panic_hook() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("{info}");
        default(info);
        process::exit(101);
    }));
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = &cli.serve {
        let addr = with_default_port(addr);
        let authority = Authority::new();
        authority.listen_tcp(addr.as_str())?;
        return Ok(());
    }

    let config = cli.apply(load_config(&cli.config)?);
    log::info!(
        "seed {} radius {} server {}",
        config.seed,
        config.render_radius,
        config.server.as_deref().unwrap_or("(none)")
    );
    let mut session = Session::open(&config)?;
    session.run(config.frames);
    session.close();
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("logging setup failed: {e}");
    }
    install_panic_hook();
    if let Err(e) = run(cli) {
        log::error!("{e}");
        process::exit(1);
    }
}
