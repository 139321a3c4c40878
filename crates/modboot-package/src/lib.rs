//! # Modboot Package
//!
//! Validated, immutable metadata for every loadable unit of a session:
//! the host application, the loader itself and each mod.
//!
//! ## Example
//!
//! ```rust
//! use modboot_package::{PackageDescriptor, VersionRange};
//!
//! let descriptor = PackageDescriptor::from_json(r#"{
//!     "name": "better-menus",
//!     "version": "1.2.0",
//!     "ccmodDependencies": { "crosscode": "^1.4.0" },
//!     "postload": "postload.js"
//! }"#).unwrap();
//!
//! let range = VersionRange::parse("^1.0.0").unwrap();
//! assert!(range.matches(descriptor.version()));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod descriptor;
pub mod error;
pub mod stage;
pub mod version;

pub use descriptor::{EntryPoints, PackageDescriptor};
pub use error::{Result, ValidationError};
pub use stage::Stage;
pub use version::{parse_version, satisfies, VersionRange};

/// Re-export of the semantic version type used throughout descriptors
pub use semver::Version;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::descriptor::{EntryPoints, PackageDescriptor};
    pub use crate::error::ValidationError;
    pub use crate::stage::Stage;
    pub use crate::version::{satisfies, VersionRange};
    pub use semver::Version;
}
