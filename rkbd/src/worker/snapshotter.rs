use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::AUTO_SNAPSHOTTER;
use crate::error::ActivationError;

use super::probe::EnvironmentProbe;

/// Snapshot storage drivers known to the OCI worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshotter {
    Native,
    Overlayfs,
}

impl Snapshotter {
    pub const ALL: [Snapshotter; 2] = [Snapshotter::Native, Snapshotter::Overlayfs];

    pub fn name(self) -> &'static str {
        match self {
            Snapshotter::Native => "native",
            // not "overlay", to match the containerd snapshotter plugin id
            Snapshotter::Overlayfs => "overlayfs",
        }
    }
}

impl FromStr for Snapshotter {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snapshotter::ALL
            .into_iter()
            .find(|snapshotter| snapshotter.name() == s)
            .ok_or_else(|| ActivationError::UnknownSnapshotter(s.to_string()))
    }
}

impl Display for Snapshotter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceReason {
    Explicit,
    AutoOverlayAvailable,
    AutoFallback { diagnostic: String },
}

/// The concrete snapshotter a worker will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverChoice {
    pub snapshotter: Snapshotter,
    pub reason: ChoiceReason,
}

impl DriverChoice {
    /// State directory of this snapshotter below the daemon root.
    pub fn snapshotter_root(&self, root: &Path) -> PathBuf {
        root.join(format!("runc-{}", self.snapshotter.name()))
    }
}

/// Resolve a configured snapshotter name, probing the host for `"auto"`.
pub fn choose_snapshotter(
    root: &Path,
    name: &str,
    probe: &dyn EnvironmentProbe,
) -> Result<DriverChoice, ActivationError> {
    if name != AUTO_SNAPSHOTTER {
        let snapshotter = name.parse::<Snapshotter>()?;
        return Ok(DriverChoice {
            snapshotter,
            reason: ChoiceReason::Explicit,
        });
    }

    let result = probe.overlay_supported(root);
    if result.supported {
        tracing::debug!("auto snapshotter: using overlayfs");
        Ok(DriverChoice {
            snapshotter: Snapshotter::Overlayfs,
            reason: ChoiceReason::AutoOverlayAvailable,
        })
    } else {
        tracing::debug!(
            "auto snapshotter: using native, because overlayfs is not available for {}: {}",
            root.display(),
            result.diagnostic
        );
        Ok(DriverChoice {
            snapshotter: Snapshotter::Native,
            reason: ChoiceReason::AutoFallback {
                diagnostic: result.diagnostic,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ChoiceReason, Snapshotter, choose_snapshotter};
    use crate::error::ActivationError;
    use crate::worker::probe::{EnvironmentProbe, ProbeResult};

    struct OverlayProbe(bool);

    impl EnvironmentProbe for OverlayProbe {
        fn overlay_supported(&self, _root: &Path) -> ProbeResult {
            if self.0 {
                ProbeResult::supported()
            } else {
                ProbeResult::unsupported("overlay is not listed in /proc/filesystems")
            }
        }

        fn executable_available(&self, _names: &[&str]) -> bool {
            panic!("snapshotter selection must not look up executables")
        }
    }

    struct UntouchedProbe;

    impl EnvironmentProbe for UntouchedProbe {
        fn overlay_supported(&self, _root: &Path) -> ProbeResult {
            panic!("explicit snapshotter must not be probed")
        }

        fn executable_available(&self, _names: &[&str]) -> bool {
            panic!("snapshotter selection must not look up executables")
        }
    }

    #[test]
    fn test_auto_prefers_overlayfs() {
        let choice = choose_snapshotter(Path::new("/var/lib/rkbd"), "auto", &OverlayProbe(true)).unwrap();
        assert_eq!(choice.snapshotter, Snapshotter::Overlayfs);
        assert_eq!(choice.reason, ChoiceReason::AutoOverlayAvailable);
    }

    #[test]
    fn test_auto_falls_back_to_native() {
        let choice = choose_snapshotter(Path::new("/var/lib/rkbd"), "auto", &OverlayProbe(false)).unwrap();
        assert_eq!(choice.snapshotter, Snapshotter::Native);
        match choice.reason {
            ChoiceReason::AutoFallback { diagnostic } => assert!(diagnostic.contains("overlay")),
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn test_explicit_names() {
        let root = Path::new("/var/lib/rkbd");
        let choice = choose_snapshotter(root, "native", &UntouchedProbe).unwrap();
        assert_eq!(choice.snapshotter, Snapshotter::Native);
        assert_eq!(choice.reason, ChoiceReason::Explicit);
        assert_eq!(choice.snapshotter_root(root), Path::new("/var/lib/rkbd/runc-native"));

        let choice = choose_snapshotter(root, "overlayfs", &UntouchedProbe).unwrap();
        assert_eq!(choice.snapshotter, Snapshotter::Overlayfs);

        match choose_snapshotter(root, "overlay", &UntouchedProbe) {
            Err(ActivationError::UnknownSnapshotter(name)) => assert_eq!(name, "overlay"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
