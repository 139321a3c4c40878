//! Runtime error types

use modboot_package::{ValidationError, Version};
use std::fmt;
use std::time::Duration;

/// Failure reading from the asset source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Nothing exists at the path
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Reading the asset failed
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Logical path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The asset is not the JSON it was expected to be
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        /// Logical path
        path: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The path escapes the source root
    #[error("Invalid asset path: {0}")]
    InvalidPath(String),
}

impl SourceError {
    /// Create a new not found error
    pub fn not_found(path: impl fmt::Display) -> Self {
        Self::NotFound(path.to_string())
    }

    /// Create a new JSON error
    pub fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by the host runtime
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host could not parse markup into a document
    #[error("Failed to parse host document: {0}")]
    Parse(String),

    /// The host rejected a document write
    #[error("Failed to write host document: {0}")]
    Write(String),

    /// Other host failure
    #[error("{0}")]
    Other(String),
}

/// Failure assembling the package catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// An asset could not be fetched
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A mod's descriptor failed validation
    #[error("Invalid package for mod '{mod_id}': {source}")]
    InvalidPackage {
        /// Mod id
        mod_id: String,
        /// Validation failure
        #[source]
        source: ValidationError,
    },

    /// A list file did not hold a list of ids
    #[error("Invalid list in '{path}': {message}")]
    InvalidList {
        /// Logical path
        path: String,
        /// Decoder message
        message: String,
    },

    /// The configured loader version is not a semantic version
    #[error("Invalid loader version: {0}")]
    InvalidLoaderVersion(#[source] ValidationError),
}

/// Failure ordering the mod set
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A declared dependency is absent or its version is out of range
    #[error("{}", unsatisfied_message(package, dependency, required, found.as_ref()))]
    UnsatisfiedDependency {
        /// Package declaring the dependency
        package: String,
        /// Dependency id
        dependency: String,
        /// Declared range
        required: String,
        /// Version present in the session, if any
        found: Option<Version>,
    },

    /// The mod set contains a dependency cycle
    #[error("Possible circular dependency among mods: {}", unresolved.join(", "))]
    CircularDependency {
        /// Mods that could not be placed
        unresolved: Vec<String>,
    },

    /// A mod id has no descriptor
    #[error("No package descriptor for mod '{0}'")]
    UnknownPackage(String),
}

fn unsatisfied_message(
    package: &str,
    dependency: &str,
    required: &str,
    found: Option<&Version>,
) -> String {
    match found {
        Some(version) => format!(
            "Mod {package} requires {dependency} {required}, but version {version} is not valid"
        ),
        None => format!("Mod {package} requires {dependency}, but no version is present"),
    }
}

impl ResolveError {
    /// Create a new unsatisfied dependency error
    pub fn unsatisfied(
        package: impl Into<String>,
        dependency: impl Into<String>,
        required: impl fmt::Display,
        found: Option<Version>,
    ) -> Self {
        Self::UnsatisfiedDependency {
            package: package.into(),
            dependency: dependency.into(),
            required: required.to_string(),
            found,
        }
    }
}

/// Failure during the host document takeover
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host entrypoint markup is unavailable
    #[error("Could not find host entrypoint '{path}': {reason}")]
    EntrypointNotFound {
        /// Logical path
        path: String,
        /// Why fetching failed
        reason: String,
    },

    /// The entrypoint has no game mount element
    #[error("Host entrypoint has no element with id '{0}'")]
    GameMountNotFound(String),

    /// A transition was attempted from the wrong state
    #[error("Invalid bridge state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the transition starts from
        expected: &'static str,
        /// Current state
        actual: &'static str,
    },

    /// The host failed an operation
    #[error(transparent)]
    Host(#[from] HostError),

    /// The host dropped the postload signal without firing it
    #[error("Host discarded the postload signal before firing it")]
    PostloadAbandoned,

    /// The host did not report readiness in time
    #[error("Host did not become ready within {0:?}")]
    ReadinessTimeout(Duration),
}

/// Failure of one mod's lifecycle stage
///
/// Never escapes the mod runtime: it is logged and recorded on the mod.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    /// A stage script failed
    #[error("Script '{path}' failed: {message}")]
    Script {
        /// Script path
        path: String,
        /// Failure message
        message: String,
    },

    /// A plugin module could not be loaded or constructed
    #[error("Module '{path}' could not be loaded: {message}")]
    Module {
        /// Module path
        path: String,
        /// Failure message
        message: String,
    },

    /// A plugin hook failed
    #[error("Plugin hook failed: {0}")]
    Hook(String),
}

impl StageError {
    /// Create a new script error
    pub fn script(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Script {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a new module error
    pub fn module(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Module {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a new hook error
    pub fn hook(message: impl fmt::Display) -> Self {
        Self::Hook(message.to_string())
    }
}

/// Fatal session failure
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The loader configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] modboot_config::Error),

    /// A required collaborator was not provided
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Packages could not be gathered or validated
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The mod set cannot be ordered
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The host takeover failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// `start` was called on a session that already ran
    #[error("Session already started")]
    AlreadyStarted,
}

/// Result type for session operations
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
