//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Logical paths the loader fetches from the asset source
    #[serde(default)]
    pub paths: PathsConfig,

    /// Pseudo packages, extensions and resolution settings
    #[serde(default)]
    pub packages: PackagesConfig,

    /// Host document takeover
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logical asset paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Host entrypoint markup
    pub entrypoint: String,

    /// JSON list of installed mod ids
    pub mod_list: String,

    /// Directory holding one sub-directory per mod
    pub mods_dir: String,

    /// JSON list of installed host extensions
    pub extension_list: String,

    /// Directory holding one sub-directory per extension
    pub extensions_dir: String,

    /// Host changelog, the first entry carries the host version
    pub changelog: String,

    /// Stylesheet injected for the status overlay
    pub stylesheet: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            entrypoint: "/node-webkit.html".to_string(),
            mod_list: "/mods.json".to_string(),
            mods_dir: "/mods".to_string(),
            extension_list: "/extensions.json".to_string(),
            extensions_dir: "/extension".to_string(),
            changelog: "/data/changelog.json".to_string(),
            stylesheet: "/index.css".to_string(),
        }
    }
}

impl PathsConfig {
    /// Descriptor path of a mod
    pub fn mod_package(&self, mod_id: &str) -> String {
        format!("{}/{}/package.json", self.mods_dir.trim_end_matches('/'), mod_id)
    }

    /// Base directory of a mod, with a trailing slash
    pub fn mod_base(&self, mod_id: &str) -> String {
        format!("{}/{}/", self.mods_dir.trim_end_matches('/'), mod_id)
    }

    /// Metadata path of an extension
    pub fn extension_metadata(&self, extension: &str) -> String {
        format!(
            "{}/{ext}/{ext}.json",
            self.extensions_dir.trim_end_matches('/'),
            ext = extension
        )
    }

    pub(crate) fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("entrypoint", self.entrypoint.as_str()),
            ("mod_list", self.mod_list.as_str()),
            ("mods_dir", self.mods_dir.as_str()),
            ("extension_list", self.extension_list.as_str()),
            ("extensions_dir", self.extensions_dir.as_str()),
            ("changelog", self.changelog.as_str()),
            ("stylesheet", self.stylesheet.as_str()),
        ]
    }
}

/// Package catalog settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackagesConfig {
    /// Id mods use to depend on the host application
    pub host_id: String,

    /// Display name of the host application
    pub host_name: String,

    /// Id mods use to depend on the loader
    pub loader_id: String,

    /// Display name of the loader
    pub loader_name: String,

    /// Version the loader reports to mods
    pub loader_version: String,

    /// Mod always placed first in the load order when installed
    pub priority_mod: Option<String>,

    /// Host extensions that get a pseudo package when installed
    pub known_extensions: Vec<String>,

    /// Upper bound on ordering passes before giving up
    pub max_resolve_passes: usize,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            host_id: "crosscode".to_string(),
            host_name: "CrossCode".to_string(),
            loader_id: "ccloader".to_string(),
            loader_name: "CCLoader-Web".to_string(),
            loader_version: "2.22.1".to_string(),
            priority_mod: Some("simplify".to_string()),
            known_extensions: [
                "post-game",
                "manlea",
                "ninja-skin",
                "fish-gear",
                "flying-hedgehag",
                "scorpion-robo",
                "snowman-tank",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_resolve_passes: 1000,
        }
    }
}

/// Host document takeover settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Id of the element the host mounts the game into
    pub game_mount_id: String,

    /// How often the host readiness flag is polled
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Give up waiting for host readiness after this long (unbounded when unset)
    #[serde(with = "humantime_serde")]
    pub readiness_timeout: Option<Duration>,

    /// Status text shown when the overlay is injected
    pub initial_status: String,

    /// Status text shown while the host boots
    pub loading_status: String,

    /// Replacement for the entrypoint's boot script
    pub boot_script: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            game_mount_id: "game".to_string(),
            poll_interval: Duration::from_millis(300),
            readiness_timeout: None,
            initial_status: "Initializing Mod Loader".to_string(),
            loading_status: "Loading Game".to_string(),
            boot_script: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}
