//! Engine configuration
//!
//! Values are resolved in this order (later wins):
//! 1. Built-in defaults
//! 2. `reprise.toml` in the working directory, or the file named by
//!    `REPRISE_CONFIG_PATH` / the `--config` flag
//! 3. `REPRISE_*` environment variables (a `.env` file is honored)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_NAME: &str = "reprise";
const CONFIG_PATH_VAR: &str = "REPRISE_CONFIG_PATH";

/// Tunables for the stack recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on the number of frames one capture may produce
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Check saved locals against the routine's declared layout
    #[serde(default = "default_verify_layouts")]
    pub verify_layouts: bool,

    /// Dump captured frame stacks as JSON at debug level
    #[serde(default)]
    pub trace_frames: bool,

    /// Fallback filter for the log subscriber when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_max_frames() -> usize {
    4096
}

fn default_verify_layouts() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
            verify_layouts: default_verify_layouts(),
            trace_frames: false,
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default file when given
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => match std::env::var(CONFIG_PATH_VAR) {
                Ok(p) => config::File::with_name(&p).required(true),
                Err(_) => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
            },
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("REPRISE")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let cfg: EngineConfig = settings
            .try_deserialize()
            .context("Failed to deserialize engine configuration")?;

        if cfg.max_frames == 0 {
            anyhow::bail!("max_frames must be at least 1");
        }

        Ok(cfg)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}
