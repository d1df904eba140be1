//! Install lifecycle of the current generation, as seen by this process.

use std::fmt;

/// Where the current generation stands.
///
/// `Installing → Active` is the normal path. `Failed` keeps the reason of a
/// strict-policy failure; calling `install` again re-enters `Installing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallPhase {
    /// No install has run in this process and the store has no ready copy.
    Pending,
    Installing,
    Active,
    Failed(String),
}

impl InstallPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, InstallPhase::Active)
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallPhase::Pending => f.write_str("pending"),
            InstallPhase::Installing => f.write_str("installing"),
            InstallPhase::Active => f.write_str("active"),
            InstallPhase::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(InstallPhase::Active.to_string(), "active");
        assert_eq!(InstallPhase::Failed("boom".into()).to_string(), "failed (boom)");
    }
}
