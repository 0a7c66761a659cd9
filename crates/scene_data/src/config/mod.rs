//! Configuration system
//!
//! [`SceneDataConfig`] groups the settings of the property containers and of
//! the z-sorting consumer. Any configuration type implementing [`Config`] can be
//! loaded from and saved to `.toml` or `.ron` files.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// # Container Configuration
///
/// Settings shared by every container created from one
/// [`ContainerFactory`](crate::data::ContainerFactory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Check provider bookkeeping on attach/detach and report contract
    /// violations as [`DataError::InvalidProviderState`](crate::DataError).
    /// Removing a provider that is not attached is an error only when this is
    /// set; otherwise it is logged and ignored.
    pub validate_providers: bool,
}

impl ContainerConfig {
    /// Enable or disable provider validation
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_providers = enabled;
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            validate_providers: cfg!(debug_assertions),
        }
    }
}

/// # Z-Sort Configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZSortConfig {
    /// Also request a re-sort on reference-changed events. Value-changed
    /// already fires for every replacement that alters a property, so this
    /// only adds redundant requests; off by default.
    pub watch_reference_changes: bool,
}

impl ZSortConfig {
    /// Subscribe to reference-changed channels as well
    pub fn with_reference_changes(mut self, enabled: bool) -> Self {
        self.watch_reference_changes = enabled;
        self
    }
}

/// # Scene Data Configuration
///
/// Top-level configuration, loadable from `.toml` or `.ron`:
///
/// ```toml
/// [container]
/// validate_providers = true
///
/// [zsort]
/// watch_reference_changes = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDataConfig {
    /// Container settings
    pub container: ContainerConfig,
    /// Z-sorting settings
    pub zsort: ZSortConfig,
}

impl SceneDataConfig {
    /// Set the container configuration
    pub fn with_container(mut self, container: ContainerConfig) -> Self {
        self.container = container;
        self
    }

    /// Set the z-sorting configuration
    pub fn with_zsort(mut self, zsort: ZSortConfig) -> Self {
        self.zsort = zsort;
        self
    }
}

impl Config for SceneDataConfig {}
