use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

// Top-level tessera.toml
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    // Remote authority address; the client runs offline when absent
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_render_radius")]
    pub render_radius: i32,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default)]
    pub seed: i32,
    #[serde(default = "default_player_sync_ms")]
    pub player_sync_ms: u64,
    // Headless frames to run before exiting
    #[serde(default = "default_frames")]
    pub frames: u64,
    // Optional atlas tile overrides (see TextureAtlas::merge_toml_str)
    #[serde(default)]
    pub atlas: Option<PathBuf>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_render_radius() -> i32 {
    6
}

fn default_batch_limit() -> usize {
    4
}

fn default_player_sync_ms() -> u64 {
    100
}

fn default_frames() -> u64 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: None,
            cache_dir: default_cache_dir(),
            render_radius: default_render_radius(),
            batch_limit: default_batch_limit(),
            seed: 0,
            player_sync_ms: default_player_sync_ms(),
            frames: default_frames(),
            atlas: None,
        }
    }
}

/// Reads `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, Box<dyn Error>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(s) => {
            let cfg: Config = toml::from_str(&s)?;
            log::info!("loaded config from {}", path.display());
            Ok(cfg)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("no config at {}; using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Voxel world client with a shared remote authority")]
pub struct Cli {
    /// Config file
    #[arg(long, default_value = "tessera.toml")]
    pub config: PathBuf,

    /// Remote authority address (host or host:port)
    #[arg(short, long)]
    pub server: Option<String>,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Render radius in chunks
    #[arg(long)]
    pub radius: Option<i32>,

    #[arg(long)]
    pub seed: Option<i32>,

    /// Headless frames to run
    #[arg(long)]
    pub frames: Option<u64>,

    /// Run an authority on this address instead of a client
    #[arg(long, value_name = "ADDR")]
    pub serve: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Flags given on the command line win over the file.
    pub fn apply(&self, mut cfg: Config) -> Config {
        if let Some(s) = &self.server {
            cfg.server = Some(s.clone());
        }
        if let Some(d) = &self.cache_dir {
            cfg.cache_dir = d.clone();
        }
        if let Some(r) = self.radius {
            cfg.render_radius = r;
        }
        if let Some(s) = self.seed {
            cfg.seed = s;
        }
        if let Some(f) = self.frames {
            cfg.frames = f;
        }
        cfg
    }
}
