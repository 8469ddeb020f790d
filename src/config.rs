//! CLI configuration surface. Zero-configuration by design: every setting
//! has a sane default and there is no persisted config file.

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8200;

#[derive(Parser, Debug)]
#[command(name = "opendlna", about = "A zero-configuration DLNA/UPnP media server")]
pub struct Cli {
    /// Directory to serve as the media library (defaults to the current directory).
    #[arg(short = 'd', long = "directory")]
    pub directory: Option<PathBuf>,

    /// HTTP port to bind (auto-increments on conflict).
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Enable debug-level logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Friendly name advertised to control points.
    #[arg(short = 'n', long = "server_name")]
    pub server_name: Option<String>,
}

/// Resolved server configuration, derived from [`Cli`] plus environment
/// overrides and filesystem defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub media_root: PathBuf,
    pub port: u16,
    pub verbose: bool,
    pub server_name: String,
}

impl ServerConfig {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let media_root = cli
            .directory
            .unwrap_or(std::env::current_dir()?)
            .canonicalize()?;

        let server_name = cli
            .server_name
            .or_else(|| std::env::var("DLNA_HOSTNAME").ok())
            .unwrap_or_else(default_server_name);

        Ok(Self {
            media_root,
            port: cli.port,
            verbose: cli.verbose,
            server_name,
        })
    }
}

fn default_server_name() -> String {
    let label = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .and_then(|h| h.split('.').next().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());
    let truncated: String = label.chars().take(16).collect();
    format!("ZeroConfigDLNA_{truncated}")
}
