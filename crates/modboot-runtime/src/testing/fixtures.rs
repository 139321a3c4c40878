//! Asset fixtures for a small game directory

use crate::source::MemoryAssetSource;
use serde_json::{json, Value};

/// Entrypoint markup with a game mount and a boot script
pub const ENTRYPOINT_MARKUP: &str = r#"<!DOCTYPE html>
<html>
<head><title>CrossCode</title></head>
<body>
<div id="game"></div>
<script type="text/javascript">startCrossCode();</script>
</body>
</html>"#;

/// Descriptor JSON for a mod
pub fn mod_package(name: &str, version: &str, dependencies: Value) -> Value {
    json!({
        "name": name,
        "version": version,
        "ccmodDependencies": dependencies
    })
}

/// Asset source holding the entrypoint, a changelog for `host_version`,
/// an empty extension list and the given mods under the default paths.
///
/// Mods are listed in the order given.
pub fn game_source(host_version: &str, mods: &[(&str, Value)]) -> MemoryAssetSource {
    let source = MemoryAssetSource::new();
    source.insert("/node-webkit.html", ENTRYPOINT_MARKUP);
    source.insert_json(
        "/data/changelog.json",
        &json!({ "changelog": [{ "version": host_version }] }),
    );
    source.insert_json("/extensions.json", &json!([]));

    let ids: Vec<&str> = mods.iter().map(|(id, _)| *id).collect();
    source.insert_json("/mods.json", &json!(ids));
    for (id, package) in mods {
        source.insert_json(format!("/mods/{id}/package.json"), package);
    }
    source
}
