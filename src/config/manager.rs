use super::{
    batch::BatchConfig, compiler::CompilerConfig, exploration::GeneticConfig,
    traits::ConfigSection,
};
use crate::error::GamlError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `GAML_GENETIC__POP_DIM=10`.
pub const ENV_PREFIX: &str = "GAML";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub compiler: CompilerConfig,
    pub genetic: GeneticConfig,
    pub batch: BatchConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), GamlError> {
        self.compiler.validate()?;
        self.genetic.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads `path` (TOML or JSON, by extension) with environment overrides on top.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GamlError> {
        let config = Self::layered(Some(path.as_ref()))?;
        self.replace(config)
    }

    /// Defaults with environment overrides only.
    pub fn load_from_env(&self) -> Result<(), GamlError> {
        let config = Self::layered(None)?;
        self.replace(config)
    }

    fn layered(path: Option<&Path>) -> Result<AppConfig, GamlError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn replace(&self, config: AppConfig) -> Result<(), GamlError> {
        let mut current = self
            .config
            .write()
            .map_err(|_| GamlError::Configuration("Config lock poisoned".to_string()))?;
        *current = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GamlError> {
        let config = self.get()?;
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| GamlError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| GamlError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig, GamlError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| GamlError::Configuration("Config lock poisoned".to_string()))
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), GamlError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| GamlError::Configuration("Config lock poisoned".to_string()))?;
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
