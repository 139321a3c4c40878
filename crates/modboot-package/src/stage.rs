//! Lifecycle stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle stage a mod can declare an entry point for.
///
/// The declaration order is the execution order; `Prestart` is declared but
/// never scheduled by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Plugin instantiation
    Plugin,
    /// Runs before the host boots
    Preload,
    /// Runs after the host document is live, before the host is ready
    Postload,
    /// Declared by descriptors, not scheduled
    Prestart,
    /// Runs once the host reports readiness
    Main,
}

impl Stage {
    /// Stages a session executes, in order
    pub const SCHEDULED: [Stage; 4] = [Stage::Plugin, Stage::Preload, Stage::Postload, Stage::Main];

    /// Descriptor field name of this stage
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Plugin => "plugin",
            Stage::Preload => "preload",
            Stage::Postload => "postload",
            Stage::Prestart => "prestart",
            Stage::Main => "main",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_order() {
        let mut sorted = Stage::SCHEDULED;
        sorted.sort();
        assert_eq!(sorted, Stage::SCHEDULED);
        assert!(!Stage::SCHEDULED.contains(&Stage::Prestart));
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::Postload.to_string(), "postload");
    }
}
