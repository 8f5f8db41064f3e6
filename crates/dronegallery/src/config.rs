//! Configuration management for dronegallery.
//!
//! Configuration is layered with figment: defaults, then a TOML file, then
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionQuery, Direction};
use crate::error::{Error, Result};
use crate::gallery::render::{
    RenderOptions, DEFAULT_BANNER_TEXT, DEFAULT_TIME_FORMAT, DEFAULT_TITLE,
};
use crate::gallery::view::{GallerySettings, DEFAULT_EXPECTED_COUNT};
use crate::record::{SchemaVariant, TIMESTAMP_FIELD};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "dronegallery";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "gallery.db";

/// Prefix of configuration environment variables.
const ENV_PREFIX: &str = "DRONEGALLERY_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DRONEGALLERY_`, `__` between
///    section and key, e.g. `DRONEGALLERY_GALLERY__EXPECTED_COUNT`)
/// 2. TOML config file at `~/.config/dronegallery/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where image-set documents come from.
    pub collection: CollectionConfig,
    /// How the gallery reads and shows them.
    pub gallery: GalleryConfig,
    /// Where frames go.
    pub output: OutputConfig,
}

/// Collection-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/dronegallery/gallery.db`
    pub database_path: Option<PathBuf>,
    /// Collection holding the image sets.
    pub name: String,
    /// Field the gallery is ordered by, newest first.
    pub order_by: String,
    /// How often the database is checked for changes, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Gallery-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Page heading.
    pub title: String,
    /// Record schema: `single`, `composite` or `auto`.
    pub schema: SchemaVariant,
    /// Record count that arms the composite banner.
    pub expected_count: usize,
    /// How long the count must hold before the banner shows, in milliseconds.
    pub banner_delay_ms: u64,
    /// Composite banner text.
    pub banner_text: String,
    /// strftime pattern for capture times.
    pub time_format: String,
}

/// Output-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// HTML page `watch` and `render` write to when no `--output` is given.
    pub html_path: Option<PathBuf>,
    /// Browser refresh interval of written pages in seconds. 0 disables.
    pub refresh_secs: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            name: "images".to_string(),
            order_by: TIMESTAMP_FIELD.to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            schema: SchemaVariant::Composite,
            expected_count: DEFAULT_EXPECTED_COUNT,
            banner_delay_ms: 2000,
            banner_text: DEFAULT_BANNER_TEXT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            html_path: None,
            refresh_secs: 2,
        }
    }
}

impl Config {
    /// Load configuration, reading `config_path` or the default config file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.collection.name.trim().is_empty() {
            return Err(invalid("collection.name must not be empty"));
        }

        if self.collection.order_by.trim().is_empty() {
            return Err(invalid("collection.order_by must not be empty"));
        }

        if self.collection.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }

        if self.gallery.expected_count == 0 {
            return Err(invalid("expected_count must be greater than 0"));
        }

        if StrftimeItems::new(&self.gallery.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid(format!(
                "invalid time_format: {}",
                self.gallery.time_format
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.collection
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.collection.poll_interval_ms)
    }

    /// Get the banner delay as a Duration.
    #[must_use]
    pub fn banner_delay(&self) -> Duration {
        Duration::from_millis(self.gallery.banner_delay_ms)
    }

    /// The query the gallery subscribes to.
    #[must_use]
    pub fn query(&self) -> CollectionQuery {
        CollectionQuery::new(self.collection.name.clone())
            .order_by(self.collection.order_by.clone(), Direction::Descending)
    }

    /// View settings for the gallery.
    #[must_use]
    pub fn gallery_settings(&self) -> GallerySettings {
        GallerySettings {
            schema: self.gallery.schema,
            timestamp_field: self.collection.order_by.clone(),
            expected_count: self.gallery.expected_count,
            banner_delay: self.banner_delay(),
        }
    }

    /// Render options for written pages and fragments.
    #[must_use]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            title: self.gallery.title.clone(),
            banner_text: self.gallery.banner_text.clone(),
            time_format: self.gallery.time_format.clone(),
            refresh_secs: self.output.refresh_secs,
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
