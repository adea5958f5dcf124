//! Layered configuration
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. a TOML file (explicit path, `SCHEMING_CONFIG_PATH`, or `./scheming.toml`)
//! 3. `SCHEMING_*` environment variables, `__` separating sections
//!    (`SCHEMING_ENGINE__EVALUATOR=cell`)
//! 4. overrides set on the builder (the CLI flags)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::interpreter::Strategy;
use crate::machine::DEFAULT_STACK_SIZE;

pub const ENV_PREFIX: &str = "SCHEMING";
pub const CONFIG_PATH_VAR: &str = "SCHEMING_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "scheming.toml";

/* ===================== Sections ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluator: Strategy,
    pub debug: bool,
    pub timing: bool,
    /// Nesting limit of the reference evaluator
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            evaluator: Strategy::default(),
            debug: false,
            timing: false,
            max_depth: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub stack_size: usize,
    /// Alternative evaluator assembly; the bundled one when unset
    pub program: Option<PathBuf>,
    pub entry: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: DEFAULT_STACK_SIZE,
            program: None,
            entry: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Steps granted per quantum
    pub quantum: usize,
    pub default_priority: i32,
    pub idle_sleep_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            quantum: 100,
            default_priority: 20,
            idle_sleep_ms: 1,
        }
    }
}

/* ===================== Config ===================== */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub vm: VmConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default file location and the environment
    pub fn load() -> Result<Self> {
        Config::builder().build()
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_depth == 0 {
            bail!("engine.max_depth must be at least 1");
        }
        if self.vm.stack_size < 16 {
            bail!("vm.stack_size must be at least 16, got {}", self.vm.stack_size);
        }
        if self.vm.entry.is_empty() {
            bail!("vm.entry must name a label");
        }
        if self.scheduler.quantum == 0 {
            bail!("scheduler.quantum must be at least 1");
        }
        Ok(())
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    environment: Option<config::Map<String, String>>,
    evaluator: Option<Strategy>,
    debug: Option<bool>,
    timing: Option<bool>,
}

impl ConfigBuilder {
    /// Config file path (overrides default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read `SCHEMING_*` variables from `vars` instead of the process environment
    pub fn environment(mut self, vars: config::Map<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    pub fn evaluator(mut self, evaluator: Option<Strategy>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Force debug on; `false` leaves the loaded value alone
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug.then_some(true);
        self
    }

    /// Force timing on; `false` leaves the loaded value alone
    pub fn timing(mut self, timing: bool) -> Self {
        self.timing = timing.then_some(true);
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to serialize default configuration")?;
        let mut sources = config::Config::builder().add_source(defaults);

        if let Some(path) = self.resolve_path()? {
            sources = sources.add_source(config::File::from(path.as_path()));
        }

        let loaded = sources
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.environment.clone()),
            )
            .build()
            .context("Failed to load configuration")?;

        let mut config: Config = loaded
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(evaluator) = self.evaluator {
            config.engine.evaluator = evaluator;
        }
        if let Some(debug) = self.debug {
            config.engine.debug = debug;
        }
        if let Some(timing) = self.timing {
            config.engine.timing = timing;
        }

        config.validate()?;
        Ok(config)
    }

    /// Explicit path, then `SCHEMING_CONFIG_PATH`, then `./scheming.toml` if present
    fn resolve_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.config_path {
            return existing(path).map(Some);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return existing(Path::new(&path)).map(Some);
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(local.is_file().then_some(local))
    }
}

fn existing(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        bail!("Config file not found: {}", path.display());
    }
    Ok(path.to_path_buf())
}
