//! Configuration loading
//!
//! Merges built-in defaults, an optional config file and environment
//! variables, in that order, then validates the result.

use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::BotConfig;

const DEFAULT_ENV_PREFIX: &str = "VOLUME_BOT";

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    /// Explicitly requested config path, usually from the CLI
    cli_config_path: Option<PathBuf>,

    /// Environment variable prefix
    env_prefix: String,

    /// Fallback search paths for configuration files
    search_paths: Vec<PathBuf>,

    /// Sources that contributed to the loaded config
    used_sources: Vec<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            cli_config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            search_paths: vec![
                PathBuf::from("./config.json"),
                PathBuf::from("./config.yaml"),
            ],
            used_sources: Vec::new(),
        }
    }

    /// Set an explicit config path; loading fails if it does not exist
    pub fn with_cli_config_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.cli_config_path = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load and validate the merged configuration
    pub fn load(&mut self) -> ConfigResult<BotConfig> {
        let mut builder = Config::builder();

        builder = builder.add_source(Config::try_from(&BotConfig::default())?);
        self.used_sources.push("default configuration".to_string());

        if let Some(path) = &self.cli_config_path {
            if !path.exists() {
                warn!("config file not found: {:?}", path);
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {:?}",
                    path
                )));
            }
            debug!("loading configuration from {:?}", path);
            builder = self.add_file_source(builder, path)?;
            self.used_sources.push(format!("config file: {:?}", path));
        } else {
            for path in &self.search_paths {
                if path.exists() {
                    debug!("loading configuration from {:?}", path);
                    builder = self.add_file_source(builder, path)?;
                    self.used_sources.push(format!("config file: {:?}", path));
                    break;
                }
            }
        }

        let env_source = Environment::with_prefix(&self.env_prefix)
            .separator("__")
            .try_parsing(true);
        builder = builder.add_source(env_source);
        self.used_sources
            .push(format!("environment variables ({}__*)", self.env_prefix));

        let config: BotConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            "configuration loaded from: {}",
            self.used_sources.join(", ")
        );
        Ok(config)
    }

    fn add_file_source(
        &self,
        builder: ConfigBuilder<config::builder::DefaultState>,
        path: &Path,
    ) -> ConfigResult<ConfigBuilder<config::builder::DefaultState>> {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => {
                return Err(ConfigError::LoadError(format!(
                    "unsupported config file format: {:?}",
                    path
                )))
            }
        };

        Ok(builder.add_source(File::from(path).format(format).required(true)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a starter configuration file with every default filled in
pub fn write_template<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
    let rendered = serde_json::to_string_pretty(&BotConfig::default())?;
    std::fs::write(path.as_ref(), rendered)?;
    info!("wrote configuration template to {:?}", path.as_ref());
    Ok(())
}
