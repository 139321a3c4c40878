//! Dependency resolution
//!
//! Orders mods so that every dependency that is itself a mod of the session
//! comes first. Dependencies on other packages (the host, the loader,
//! extensions) are version checked but never gate ordering.
//!
//! Ordering is a repeated greedy pass over the mod ids in the order they
//! were given: each pass appends every mod whose in-set dependencies are
//! already placed. The output is deterministic for a given input order but
//! not sorted.

use crate::catalog::PackageMap;
use crate::error::ResolveError;
use std::collections::HashSet;
use tracing::debug;

/// Default bound on ordering passes
pub const DEFAULT_MAX_PASSES: usize = 1000;

/// Orders a mod set against a package map
#[derive(Debug, Clone)]
pub struct DependencyResolver<'a> {
    packages: &'a PackageMap,
    priority: Option<&'a str>,
    max_passes: usize,
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver over every package of the session
    pub fn new(packages: &'a PackageMap) -> Self {
        Self {
            packages,
            priority: None,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Mod forced to the front of the order whenever it is present
    pub fn priority(mut self, priority: Option<&'a str>) -> Self {
        self.priority = priority;
        self
    }

    /// Bound on ordering passes
    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Check every declared dependency of every package, then order the mods
    pub fn order(&self, mod_ids: &[String]) -> Result<Vec<String>, ResolveError> {
        self.check()?;
        self.sort(mod_ids)
    }

    /// Check that every declared dependency exists and satisfies its range
    pub fn check(&self) -> Result<(), ResolveError> {
        for (id, descriptor) in self.packages {
            for (dependency, range) in descriptor.dependencies() {
                let Some(found) = self.packages.get(dependency) else {
                    return Err(ResolveError::unsatisfied(id, dependency, range, None));
                };

                if !range.matches(found.version()) {
                    return Err(ResolveError::unsatisfied(
                        id,
                        dependency,
                        range,
                        Some(found.version().clone()),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Order mod ids without checking versions
    pub fn sort(&self, mod_ids: &[String]) -> Result<Vec<String>, ResolveError> {
        let mut unique = HashSet::with_capacity(mod_ids.len());
        let ids: Vec<&str> = mod_ids
            .iter()
            .map(String::as_str)
            .filter(|id| unique.insert(*id))
            .collect();

        if let Some(missing) = ids.iter().find(|id| !self.packages.contains_key(**id)) {
            return Err(ResolveError::UnknownPackage(missing.to_string()));
        }

        let in_set: HashSet<&str> = ids.iter().copied().collect();
        let mut ordered: Vec<&str> = Vec::with_capacity(ids.len());
        let mut placed: HashSet<&str> = HashSet::with_capacity(ids.len());

        if let Some(priority) = self.priority.filter(|p| in_set.contains(p)) {
            ordered.push(priority);
            placed.insert(priority);
        }

        let mut passes = 0;
        while ordered.len() < ids.len() {
            if passes == self.max_passes {
                return Err(self.circular(&ids, &placed));
            }
            passes += 1;

            let before = ordered.len();
            for &id in &ids {
                if !placed.contains(id) && self.can_load(id, &in_set, &placed) {
                    ordered.push(id);
                    placed.insert(id);
                }
            }

            if ordered.len() == before {
                return Err(self.circular(&ids, &placed));
            }
        }

        debug!(passes, order = ?ordered, "Load order resolved");

        Ok(ordered.into_iter().map(String::from).collect())
    }

    fn can_load(&self, id: &str, in_set: &HashSet<&str>, placed: &HashSet<&str>) -> bool {
        self.packages.get(id).map_or(false, |descriptor| {
            descriptor
                .dependencies()
                .keys()
                .all(|dep| !in_set.contains(dep.as_str()) || placed.contains(dep.as_str()))
        })
    }

    fn circular(&self, ids: &[&str], placed: &HashSet<&str>) -> ResolveError {
        ResolveError::CircularDependency {
            unresolved: ids
                .iter()
                .filter(|id| !placed.contains(**id))
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modboot_package::{PackageDescriptor, Version};
    use serde_json::json;
    use std::sync::Arc;

    fn package(name: &str, version: &str, deps: serde_json::Value) -> Arc<PackageDescriptor> {
        Arc::new(
            PackageDescriptor::from_value(json!({
                "name": name,
                "version": version,
                "ccmodDependencies": deps
            }))
            .unwrap(),
        )
    }

    fn packages(entries: &[(&str, &str, serde_json::Value)]) -> PackageMap {
        let mut map = PackageMap::new();
        map.insert(
            "crosscode".to_string(),
            Arc::new(PackageDescriptor::pseudo("CrossCode", Version::new(1, 4, 2))),
        );
        for (id, version, deps) in entries {
            map.insert(id.to_string(), package(id, version, deps.clone()));
        }
        map
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let map = packages(&[
            ("ui", "1.0.0", json!({ "core": "*", "items": "*" })),
            ("items", "1.0.0", json!({ "core": "^1.0.0" })),
            ("core", "1.1.0", json!({ "crosscode": "^1.4.0" })),
            ("loose", "0.1.0", json!({})),
        ]);

        let order = DependencyResolver::new(&map)
            .order(&ids(&["ui", "items", "core", "loose"]))
            .unwrap();

        assert_eq!(order.len(), 4);
        assert!(position(&order, "core") < position(&order, "items"));
        assert!(position(&order, "items") < position(&order, "ui"));
    }

    #[test]
    fn test_scan_order_breaks_ties() {
        let map = packages(&[
            ("zeta", "1.0.0", json!({})),
            ("alpha", "1.0.0", json!({})),
            ("mid", "1.0.0", json!({ "zeta": "*" })),
        ]);

        let order = DependencyResolver::new(&map)
            .sort(&ids(&["mid", "zeta", "alpha"]))
            .unwrap();

        // `mid` waits for the second pass; `zeta` and `alpha` keep scan order.
        assert_eq!(order, ids(&["zeta", "alpha", "mid"]));
    }

    #[test]
    fn test_dependency_placed_earlier_in_same_pass() {
        let map = packages(&[
            ("base", "1.0.0", json!({})),
            ("addon", "1.0.0", json!({ "base": "*" })),
        ]);

        let order = DependencyResolver::new(&map)
            .sort(&ids(&["base", "addon"]))
            .unwrap();
        assert_eq!(order, ids(&["base", "addon"]));
    }

    #[test]
    fn test_priority_first_regardless_of_dependencies() {
        let map = packages(&[
            ("a", "1.0.0", json!({})),
            ("simplify", "2.0.0", json!({ "a": "*" })),
        ]);

        let order = DependencyResolver::new(&map)
            .priority(Some("simplify"))
            .order(&ids(&["a", "simplify"]))
            .unwrap();
        assert_eq!(order, ids(&["simplify", "a"]));

        let absent = DependencyResolver::new(&map)
            .priority(Some("not-installed"))
            .order(&ids(&["a"]))
            .unwrap();
        assert_eq!(absent, ids(&["a"]));
    }

    #[test]
    fn test_cycle_detected() {
        let map = packages(&[
            ("a", "1.0.0", json!({ "b": "*" })),
            ("b", "1.0.0", json!({ "a": "*" })),
            ("c", "1.0.0", json!({})),
        ]);

        let err = DependencyResolver::new(&map)
            .order(&ids(&["a", "b", "c"]))
            .unwrap_err();
        match err {
            ResolveError::CircularDependency { unresolved } => {
                assert_eq!(unresolved, ids(&["a", "b"]))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_circular() {
        let map = packages(&[("a", "1.0.0", json!({ "a": "*" }))]);
        let err = DependencyResolver::new(&map).order(&ids(&["a"])).unwrap_err();
        assert!(matches!(err, ResolveError::CircularDependency { .. }));
    }

    #[test]
    fn test_pass_bound() {
        // A chain declared back to front needs one pass per link.
        let map = packages(&[
            ("a", "1.0.0", json!({ "b": "*" })),
            ("b", "1.0.0", json!({ "c": "*" })),
            ("c", "1.0.0", json!({})),
        ]);
        let mods = ids(&["a", "b", "c"]);

        assert!(DependencyResolver::new(&map).max_passes(3).sort(&mods).is_ok());
        assert!(matches!(
            DependencyResolver::new(&map).max_passes(2).sort(&mods),
            Err(ResolveError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_out_of_set_version_mismatch() {
        let map = packages(&[("a", "1.0.0", json!({ "crosscode": "^2.0.0" }))]);

        let err = DependencyResolver::new(&map).order(&ids(&["a"])).unwrap_err();
        match err {
            ResolveError::UnsatisfiedDependency {
                package,
                dependency,
                found,
                ..
            } => {
                assert_eq!(package, "a");
                assert_eq!(dependency, "crosscode");
                assert_eq!(found, Some(Version::new(1, 4, 2)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_dependency() {
        let map = packages(&[("a", "1.0.0", json!({ "ghost": "*" }))]);
        let err = DependencyResolver::new(&map).order(&ids(&["a"])).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnsatisfiedDependency { found: None, .. }
        ));
    }

    #[test]
    fn test_in_set_version_mismatch() {
        let map = packages(&[
            ("A", "1.2.0", json!({})),
            ("B", "1.0.0", json!({ "A": "^1.0.0" })),
            ("C", "1.0.0", json!({ "A": "^2.0.0" })),
        ]);
        let resolver = DependencyResolver::new(&map);
        let mods = ids(&["A", "B"]);
        assert_eq!(
            resolver.order(&mods).unwrap_err().to_string(),
            "Mod C requires A ^2.0.0, but version 1.2.0 is not valid"
        );
        assert_eq!(resolver.sort(&mods).unwrap(), mods);
    }

    #[test]
    fn test_duplicates_and_unknown_ids() {
        let map = packages(&[("a", "1.0.0", json!({}))]);

        let order = DependencyResolver::new(&map).sort(&ids(&["a", "a"])).unwrap();
        assert_eq!(order, ids(&["a"]));

        let err = DependencyResolver::new(&map).sort(&ids(&["nope"])).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownPackage(_)));
    }

    mod proptest_resolver {
        use super::*;
        use proptest::prelude::*;
        use proptest::sample::Index;

        fn mod_id(i: usize) -> String {
            format!("m{i}")
        }

        fn graph(deps: &[Vec<usize>]) -> PackageMap {
            let entries: Vec<(String, serde_json::Value)> = deps
                .iter()
                .enumerate()
                .map(|(i, targets)| {
                    let map: serde_json::Map<String, serde_json::Value> =
                        targets.iter().map(|&j| (mod_id(j), json!("*"))).collect();
                    (mod_id(i), serde_json::Value::Object(map))
                })
                .collect();

            let mut map = PackageMap::new();
            for (id, deps) in entries {
                map.insert(id.clone(), package(&id, "1.0.0", deps));
            }
            map
        }

        /// Strategy: an acyclic graph (node i depends only on nodes below i)
        /// and a shuffled listing order
        fn dag_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
            (1usize..24)
                .prop_flat_map(|n| {
                    let picks =
                        prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), n);
                    let listing = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
                    (picks, listing)
                })
                .prop_map(|(picks, listing)| {
                    let deps = picks
                        .iter()
                        .enumerate()
                        .map(|(i, targets)| {
                            if i == 0 {
                                Vec::new()
                            } else {
                                targets.iter().map(|t| t.index(i)).collect()
                            }
                        })
                        .collect();
                    (deps, listing)
                })
        }

        /// Strategy: a ring of mods each depending on the next, shuffled
        fn ring_strategy() -> impl Strategy<Value = Vec<usize>> {
            (1usize..12).prop_flat_map(|k| Just((0..k).collect::<Vec<_>>()).prop_shuffle())
        }

        proptest! {
            /// Every in-set dependency precedes its dependent
            #[test]
            fn dependencies_precede_dependents((deps, listing) in dag_strategy()) {
                let map = graph(&deps);
                let ids: Vec<String> = listing.iter().map(|&i| mod_id(i)).collect();

                let order = DependencyResolver::new(&map).order(&ids).unwrap();

                let mut sorted_order = order.clone();
                sorted_order.sort();
                let mut sorted_ids = ids.clone();
                sorted_ids.sort();
                prop_assert_eq!(sorted_order, sorted_ids);

                for (i, targets) in deps.iter().enumerate() {
                    for &j in targets {
                        prop_assert!(
                            position(&order, &mod_id(j)) < position(&order, &mod_id(i)),
                            "{} must precede {}", mod_id(j), mod_id(i)
                        );
                    }
                }
            }

            /// The priority mod leads whatever it depends on
            #[test]
            fn priority_always_first((deps, listing) in dag_strategy(), pick in any::<Index>()) {
                let map = graph(&deps);
                let ids: Vec<String> = listing.iter().map(|&i| mod_id(i)).collect();
                let priority = mod_id(pick.index(deps.len()));

                let order = DependencyResolver::new(&map)
                    .priority(Some(priority.as_str()))
                    .order(&ids)
                    .unwrap();
                prop_assert_eq!(&order[0], &priority);
                prop_assert_eq!(order.len(), ids.len());
            }

            /// A dependency ring is always reported, naming every member
            #[test]
            fn ring_is_circular(listing in ring_strategy()) {
                let k = listing.len();
                let deps: Vec<Vec<usize>> = (0..k).map(|i| vec![(i + 1) % k]).collect();
                let map = graph(&deps);
                let ids: Vec<String> = listing.iter().map(|&i| mod_id(i)).collect();

                match DependencyResolver::new(&map).order(&ids) {
                    Err(ResolveError::CircularDependency { unresolved }) => {
                        prop_assert_eq!(unresolved.len(), k);
                    }
                    other => prop_assert!(false, "expected a cycle, got {:?}", other),
                }
            }
        }
    }
}
