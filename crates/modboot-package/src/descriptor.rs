//! Package descriptors
//!
//! A descriptor is validated once from its raw JSON form and never mutated
//! afterwards. The schema is strict: unknown fields are rejected.

use crate::error::{Result, ValidationError};
use crate::stage::Stage;
use crate::version::{parse_version, VersionRange};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw descriptor exactly as found in a `package.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawDescriptor {
    name: String,
    #[serde(rename = "ccmodHumanName")]
    human_name: Option<String>,
    version: String,
    #[serde(rename = "ccmodDependencies", default)]
    dependencies: BTreeMap<String, String>,
    module: Option<bool>,
    hidden: Option<bool>,
    description: Option<String>,
    homepage: Option<String>,
    assets: Option<Vec<String>>,
    runtime_assets: Option<BTreeMap<String, String>>,
    main: Option<String>,
    preload: Option<String>,
    postload: Option<String>,
    prestart: Option<String>,
    plugin: Option<String>,
}

/// Script paths of a package's lifecycle entry points, relative to its
/// base directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoints {
    /// Plugin module exporting a plugin factory
    pub plugin: Option<String>,
    /// Preload script
    pub preload: Option<String>,
    /// Postload script
    pub postload: Option<String>,
    /// Prestart script
    pub prestart: Option<String>,
    /// Main script
    pub main: Option<String>,
}

impl EntryPoints {
    /// Entry point declared for a stage
    pub fn get(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Plugin => self.plugin.as_deref(),
            Stage::Preload => self.preload.as_deref(),
            Stage::Postload => self.postload.as_deref(),
            Stage::Prestart => self.prestart.as_deref(),
            Stage::Main => self.main.as_deref(),
        }
    }
}

/// Validated package metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    name: String,
    human_name: Option<String>,
    version: Version,
    dependencies: BTreeMap<String, VersionRange>,
    module: bool,
    hidden: bool,
    description: Option<String>,
    homepage: Option<String>,
    assets: Option<Vec<String>>,
    runtime_assets: BTreeMap<String, String>,
    entry_points: EntryPoints,
}

impl PackageDescriptor {
    /// Validate a descriptor from its JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_str(text)?;
        Self::validate(raw)
    }

    /// Validate a descriptor from an already decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_value(value)?;
        Self::validate(raw)
    }

    /// Descriptor for a package that has no files of its own, such as the
    /// host application or the loader
    pub fn pseudo(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            human_name: None,
            version,
            dependencies: BTreeMap::new(),
            module: false,
            hidden: false,
            description: None,
            homepage: None,
            assets: None,
            runtime_assets: BTreeMap::new(),
            entry_points: EntryPoints::default(),
        }
    }

    fn validate(raw: RawDescriptor) -> Result<Self> {
        let version = parse_version(&raw.version)?;

        let dependencies = raw
            .dependencies
            .into_iter()
            .map(|(id, range)| {
                VersionRange::parse(&range)
                    .map(|parsed| (id.clone(), parsed))
                    .map_err(|e| e.for_dependency(&id))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            name: raw.name,
            human_name: raw.human_name,
            version,
            dependencies,
            module: raw.module.unwrap_or(false),
            hidden: raw.hidden.unwrap_or(false),
            description: raw.description,
            homepage: raw.homepage,
            assets: raw.assets,
            runtime_assets: raw.runtime_assets.unwrap_or_default(),
            entry_points: EntryPoints {
                plugin: raw.plugin,
                preload: raw.preload,
                postload: raw.postload,
                prestart: raw.prestart,
                main: raw.main,
            },
        })
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name shown to players, falling back to the package name
    pub fn display_name(&self) -> &str {
        self.human_name.as_deref().unwrap_or(&self.name)
    }

    /// Package version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Declared dependencies, keyed by package id
    pub fn dependencies(&self) -> &BTreeMap<String, VersionRange> {
        &self.dependencies
    }

    /// Whether scripts are loaded as modules
    pub fn is_module(&self) -> bool {
        self.module
    }

    /// Whether the package is hidden from mod listings
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Free-form description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Homepage URL
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Asset paths the package declares it overrides
    pub fn assets(&self) -> Option<&[String]> {
        self.assets.as_deref()
    }

    /// Asset redirections resolved at runtime
    pub fn runtime_assets(&self) -> &BTreeMap<String, String> {
        &self.runtime_assets
    }

    /// Lifecycle entry points
    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry_points
    }

    /// Entry point declared for one stage
    pub fn entry_point(&self, stage: Stage) -> Option<&str> {
        self.entry_points.get(stage)
    }
}
