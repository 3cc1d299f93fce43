/// CLI configuration
use anyhow::{bail, Context, Result};
use lyra_core::ListenerRole;
use lyra_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "lyra.toml";

/// Prefix of environment overrides, e.g. `LYRA_PLAYER__AD_THRESHOLD=3`
pub const ENV_PREFIX: &str = "LYRA";

/// Log filter used when neither `RUST_LOG` nor `log_filter` is set
pub const DEFAULT_LOG_FILTER: &str = "lyra=info,lyra_playback=info";

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub player: PlayerConfig,

    pub listener: ListenerSettings,

    /// Advertisement clips, rotated in order
    pub ads: Vec<PathBuf>,

    /// `tracing` filter directive; `RUST_LOG` still wins
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub id: String,

    /// Empty means free tier
    pub roles: Vec<ListenerRole>,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
            roles: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `lyra.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Nested keys use a double underscore: LYRA_LISTENER__ID
        settings = settings.add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .context("failed to read configuration")?;
        let loaded: Self = config
            .try_deserialize()
            .context("invalid configuration")?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.listener.id.trim().is_empty() {
            bail!("listener.id must not be empty");
        }
        if let Err(reason) = self.player.validate() {
            bail!("invalid player settings: {reason}");
        }
        Ok(())
    }
}
