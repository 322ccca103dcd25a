//! Build phase enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four phases of a build pipeline, in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    /// Plugins preparing the build context (release bumping, manifests).
    Prebuild,
    /// Plugins producing the built artifact; exactly one is expected to win.
    Buildstep,
    /// Plugins attaching metadata to the built artifact.
    Postbuild,
    /// Cleanup/reporting plugins; run on every exit path.
    Exit,
}

impl BuildPhase {
    /// All phases in execution order.
    pub const ORDER: [Self; 4] = [Self::Prebuild, Self::Buildstep, Self::Postbuild, Self::Exit];

    /// Returns true for the phases that are skipped after an abort.
    ///
    /// The exit phase is never skipped.
    #[must_use]
    pub fn is_abortable(&self) -> bool {
        !matches!(self, Self::Exit)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prebuild => write!(f, "prebuild"),
            Self::Buildstep => write!(f, "buildstep"),
            Self::Postbuild => write!(f, "postbuild"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(BuildPhase::Prebuild.to_string(), "prebuild");
        assert_eq!(BuildPhase::Buildstep.to_string(), "buildstep");
        assert_eq!(BuildPhase::Postbuild.to_string(), "postbuild");
        assert_eq!(BuildPhase::Exit.to_string(), "exit");
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(BuildPhase::ORDER.len(), 4);
        assert_eq!(BuildPhase::ORDER[0], BuildPhase::Prebuild);
        assert_eq!(BuildPhase::ORDER[3], BuildPhase::Exit);
    }

    #[test]
    fn test_exit_is_not_abortable() {
        assert!(BuildPhase::Prebuild.is_abortable());
        assert!(BuildPhase::Buildstep.is_abortable());
        assert!(BuildPhase::Postbuild.is_abortable());
        assert!(!BuildPhase::Exit.is_abortable());
    }

    #[test]
    fn test_phase_serialize() {
        let json = serde_json::to_string(&BuildPhase::Buildstep).unwrap();
        assert_eq!(json, r#""buildstep""#);
    }
}
