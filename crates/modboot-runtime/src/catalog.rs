//! Package catalog
//!
//! Gathers every descriptor a session knows about: the host and loader
//! pseudo packages, known host extensions and the installed mods.

use crate::error::{CatalogError, SourceError};
use crate::source::AssetSource;
use futures::future::try_join_all;
use modboot_config::LoaderConfig;
use modboot_package::{parse_version, PackageDescriptor, Version};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Descriptors keyed by package id
pub type PackageMap = BTreeMap<String, Arc<PackageDescriptor>>;

/// All packages of a session plus the ids that are real mods
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: PackageMap,
    mod_ids: Vec<String>,
}

impl Catalog {
    /// Fetch and validate every package of the session.
    ///
    /// Extension and mod descriptors are fetched concurrently; the mod id
    /// order of the mod list is preserved.
    pub async fn gather(
        source: &dyn AssetSource,
        config: &LoaderConfig,
        host_version: &Version,
    ) -> Result<Self, CatalogError> {
        let packages_config = &config.packages;
        let paths = &config.paths;

        let loader_version = parse_version(&packages_config.loader_version)
            .map_err(CatalogError::InvalidLoaderVersion)?;

        let mut packages = PackageMap::new();
        packages.insert(
            packages_config.host_id.clone(),
            Arc::new(PackageDescriptor::pseudo(
                &packages_config.host_name,
                host_version.clone(),
            )),
        );
        packages.insert(
            packages_config.loader_id.clone(),
            Arc::new(PackageDescriptor::pseudo(
                &packages_config.loader_name,
                loader_version,
            )),
        );

        let extensions: Vec<String> = fetch_list(source, &paths.extension_list).await?;
        let known: Vec<&String> = extensions
            .iter()
            .filter(|ext| packages_config.known_extensions.contains(ext))
            .collect();

        let extension_packages = try_join_all(known.into_iter().map(|ext| async move {
            let metadata = source.fetch_json(&paths.extension_metadata(ext)).await?;
            let name = match metadata.pointer("/name/en_US").and_then(|v| v.as_str()) {
                Some(name) => name.to_string(),
                None => {
                    warn!(
                        extension = %ext,
                        "Extension metadata has no English name, using its id"
                    );
                    ext.clone()
                }
            };
            let descriptor = PackageDescriptor::pseudo(name, host_version.clone());
            Ok::<_, SourceError>((ext.clone(), descriptor))
        }))
        .await?;

        for (id, descriptor) in extension_packages {
            debug!(extension = %id, "Extension package added");
            packages.insert(id, Arc::new(descriptor));
        }

        let listed: Vec<String> = fetch_list(source, &paths.mod_list).await?;
        let mod_ids = dedupe(listed);

        let mod_packages = try_join_all(mod_ids.iter().map(|id| async move {
            let value = source.fetch_json(&paths.mod_package(id)).await?;
            PackageDescriptor::from_value(value)
                .map(|descriptor| (id.clone(), descriptor))
                .map_err(|source| CatalogError::InvalidPackage {
                    mod_id: id.clone(),
                    source,
                })
        }))
        .await?;

        for (id, descriptor) in mod_packages {
            if packages.contains_key(&id) {
                warn!(mod_id = %id, "Mod shadows a built-in package");
            }
            packages.insert(id, Arc::new(descriptor));
        }

        info!(
            packages = packages.len(),
            mods = mod_ids.len(),
            "Package catalog gathered"
        );

        Ok(Self { packages, mod_ids })
    }

    /// Every package, pseudo packages included
    pub fn packages(&self) -> &PackageMap {
        &self.packages
    }

    /// Installed mod ids in mod list order
    pub fn mod_ids(&self) -> &[String] {
        &self.mod_ids
    }

    /// Descriptor of a package
    pub fn get(&self, id: &str) -> Option<&Arc<PackageDescriptor>> {
        self.packages.get(id)
    }

    /// Id to version table of every package
    pub fn versions(&self) -> BTreeMap<String, String> {
        self.packages
            .iter()
            .map(|(id, descriptor)| (id.clone(), descriptor.version().to_string()))
            .collect()
    }
}

async fn fetch_list<T: DeserializeOwned>(
    source: &dyn AssetSource,
    path: &str,
) -> Result<T, CatalogError> {
    let value = source.fetch_json(path).await?;
    serde_json::from_value(value).map_err(|e| CatalogError::InvalidList {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| {
            let fresh = seen.insert(id.clone());
            if !fresh {
                warn!(mod_id = %id, "Mod listed more than once, ignoring duplicate");
            }
            fresh
        })
        .collect()
}
