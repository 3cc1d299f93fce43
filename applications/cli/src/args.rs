/// Command-line arguments
use crate::config::CliConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lyra_core::ListenerRole;
use lyra_playback::RepeatMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lyra")]
#[command(version, about = "Lyra MP3 player", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play MP3 files, then read commands from stdin
    Play(PlayArgs),

    /// Print frame count and duration of MP3 files
    Probe {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Songs, in playlist order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Shuffle the songs after the first
    #[arg(long)]
    pub shuffle: bool,

    /// Repeat mode: off, all or one
    #[arg(long)]
    pub repeat: Option<RepeatMode>,

    /// Listener identifier used by the ad gate
    #[arg(long)]
    pub listener: Option<String>,

    /// Listener role (repeatable)
    #[arg(long = "role", value_enum)]
    pub roles: Vec<RoleArg>,

    /// Advertisement clip (repeatable, replaces configured clips)
    #[arg(long = "ad", value_name = "FILE")]
    pub ads: Vec<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Free,
    Premium,
    Admin,
    Artist,
}

impl From<RoleArg> for ListenerRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Free => ListenerRole::Free,
            RoleArg::Premium => ListenerRole::Premium,
            RoleArg::Admin => ListenerRole::Admin,
            RoleArg::Artist => ListenerRole::Artist,
        }
    }
}

impl PlayArgs {
    /// Command-line flags win over file and environment settings
    pub fn apply_to(&self, config: &mut CliConfig) {
        if let Some(mode) = self.repeat {
            config.player.repeat = mode;
        }
        if let Some(listener) = &self.listener {
            config.listener.id.clone_from(listener);
        }
        if !self.roles.is_empty() {
            config.listener.roles = self.roles.iter().copied().map(Into::into).collect();
        }
        if !self.ads.is_empty() {
            config.ads.clone_from(&self.ads);
        }
    }
}
