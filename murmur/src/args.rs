use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Murmur upload relay
#[derive(Debug, Parser)]
#[command(name = "murmur", about = "Streams browser audio uploads to a speech-to-text provider")]
pub struct Args {
    /// Path to configuration file; defaults and environment only when omitted
    #[arg(short, long, env = "MURMUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, env = "MURMUR_LISTEN")]
    pub listen: Option<SocketAddr>,
}
