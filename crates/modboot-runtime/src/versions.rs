//! Host version bookkeeping

use crate::source::AssetSource;
use crate::store::{KeyValueStore, HOST_VERSION_KEY};
use modboot_package::{parse_version, Version};
use serde::Deserialize;
use tracing::{debug, warn};

/// Version assumed when the host version cannot be determined
pub const FALLBACK_VERSION: Version = Version::new(0, 0, 0);

#[derive(Debug, Deserialize)]
struct Changelog {
    changelog: Vec<ChangelogEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangelogEntry {
    version: String,
}

#[derive(Debug, Deserialize)]
struct StoredVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

/// Determine the host version.
///
/// Reads the first changelog entry from live data, then the version record
/// persisted by the host, and finally settles on [`FALLBACK_VERSION`].
/// Never fails.
pub async fn establish_host_version(
    source: &dyn AssetSource,
    store: &dyn KeyValueStore,
    changelog_path: &str,
) -> Version {
    let live_error = match live_version(source, changelog_path).await {
        Ok(version) => {
            debug!(version = %version, "Host version read from changelog");
            return version;
        }
        Err(e) => e,
    };

    if let Some(version) = stored_version(store) {
        debug!(version = %version, "Host version read from persisted state");
        return version;
    }

    warn!(
        error = %live_error,
        "Could not find host version. Assuming \"{}\"", FALLBACK_VERSION
    );
    FALLBACK_VERSION
}

async fn live_version(source: &dyn AssetSource, path: &str) -> Result<Version, String> {
    let value = source.fetch_json(path).await.map_err(|e| e.to_string())?;
    let changelog: Changelog = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let latest = changelog
        .changelog
        .first()
        .ok_or_else(|| format!("changelog in '{path}' is empty"))?;
    parse_version(&latest.version).map_err(|e| e.to_string())
}

fn stored_version(store: &dyn KeyValueStore) -> Option<Version> {
    let raw = store.get(HOST_VERSION_KEY)?;
    match serde_json::from_str::<StoredVersion>(&raw) {
        Ok(stored) => Some(Version::new(stored.major, stored.minor, stored.patch)),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed persisted host version");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryAssetSource;
    use crate::store::MemoryStore;
    use serde_json::json;

    const CHANGELOG: &str = "/data/changelog.json";

    #[tokio::test]
    async fn test_version_from_changelog() {
        let source = MemoryAssetSource::new();
        source.insert_json(
            CHANGELOG,
            &json!({ "changelog": [{ "version": "1.4.2" }, { "version": "1.4.1" }] }),
        );
        let store =
            MemoryStore::from_entries([(HOST_VERSION_KEY, r#"{"major":9,"minor":9,"patch":9}"#)]);

        let version = establish_host_version(&source, &store, CHANGELOG).await;
        assert_eq!(version, Version::new(1, 4, 2));
    }

    #[tokio::test]
    async fn test_version_from_store() {
        let source = MemoryAssetSource::new();
        let store =
            MemoryStore::from_entries([(HOST_VERSION_KEY, r#"{"major":1,"minor":3,"patch":0}"#)]);

        let version = establish_host_version(&source, &store, CHANGELOG).await;
        assert_eq!(version, Version::new(1, 3, 0));
    }

    #[tokio::test]
    async fn test_version_fallback() {
        let source = MemoryAssetSource::new();
        source.insert_json(CHANGELOG, &json!({ "changelog": [] }));
        let store = MemoryStore::from_entries([(HOST_VERSION_KEY, "garbage")]);

        let version = establish_host_version(&source, &store, CHANGELOG).await;
        assert_eq!(version, FALLBACK_VERSION);
    }
}
