use crate::models::ExtensionSet;
use crate::services::EngineOptions;
use crate::store::{YamlPathStore, parse_extensions};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Name of the settings file inside the configuration directory
pub const SETTINGS_FILE: &str = "pathedit.yaml";

/// Prefix of environment overrides, e.g. `PATHEDIT__DISCOVERY__MAX_DEPTH=2`
pub const ENV_PREFIX: &str = "PATHEDIT";

const FALLBACK_EXTENSIONS: &str = ".com;.exe;.bat;.cmd";

/// Host settings for the engine and the command line front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Executable extensions, `PATHEXT` style
    pub extensions: Vec<String>,

    /// Expire cached directory listings after this many seconds. Unset keeps them until
    /// explicitly invalidated.
    pub cache_ttl_secs: Option<u64>,

    pub discovery: DiscoverySettings,

    /// Path store file, relative to the configuration directory unless absolute
    pub store_file: Utf8PathBuf,

    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let pathext = std::env::var("PATHEXT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self {
            extensions: parse_extensions(pathext.as_deref().unwrap_or(FALLBACK_EXTENSIONS)),
            cache_ttl_secs: None,
            discovery: DiscoverySettings::default(),
            store_file: Utf8PathBuf::from("paths.yaml"),
            debug_mode: false,
        }
    }
}

impl Settings {
    /// Extension set for shadow detection and search (`.dll` included)
    pub fn extension_set(&self) -> ExtensionSet {
        ExtensionSet::for_shadowing(&self.extensions)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            cache_ttl: self.cache_ttl_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub max_depth: usize,

    /// Never descended, in addition to the OS directory
    pub skip_dirs: Vec<Utf8PathBuf>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_depth: 4,
            skip_dirs: Vec::new(),
        }
    }
}

/// Loads and saves [`Settings`] in a configuration directory.
///
/// The settings file is optional; `PATHEDIT__*` environment variables override it.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a manager for `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Load settings from the file and the environment, defaults for anything unset.
    pub fn load_settings(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: Settings = Config::builder()
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(";")
                    .with_list_parse_key("extensions")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// The path store named by `settings`
    pub fn path_store(&self, settings: &Settings) -> YamlPathStore {
        if settings.store_file.is_absolute() {
            YamlPathStore::new(settings.store_file.clone())
        } else {
            YamlPathStore::new(self.config_dir.join(&settings.store_file))
        }
    }
}
