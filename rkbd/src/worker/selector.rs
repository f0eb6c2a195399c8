use std::path::Path;

use crate::config::OciWorkerConfig;
use crate::error::{ActivationError, Result};

use super::flag::Enabled;
use super::probe::EnvironmentProbe;
use super::snapshotter::{DriverChoice, choose_snapshotter};

/// Runtime binaries the OCI worker can drive, in lookup order.
pub const OCI_BINARIES: [&str; 2] = ["runc", "buildkit-runc"];

/// How build containers see the host process namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    Sandbox,
    /// Host PID namespace and procfs. Only allowed when rootless.
    NoSandbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    pub driver: DriverChoice,
    pub process_mode: ProcessMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Skip(SkipReason),
    Activate(ActivationPlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    RuntimeNotFound,
}

/// Decide whether the OCI worker runs and with which snapshotter.
///
/// The decision is made once per activation pass and never revisited.
pub fn select(config: &OciWorkerConfig, root: &Path, probe: &dyn EnvironmentProbe) -> Result<Selection> {
    let process_mode = process_mode(config)?;

    match Enabled::from_option(config.enabled) {
        Enabled::False => {
            tracing::debug!("oci worker is disabled");
            return Ok(Selection::Skip(SkipReason::Disabled));
        }
        Enabled::Auto => {
            if !probe.executable_available(&OCI_BINARIES) {
                tracing::warn!("skipping oci worker, as runc does not exist");
                return Ok(Selection::Skip(SkipReason::RuntimeNotFound));
            }
        }
        Enabled::True => {}
    }

    let driver = choose_snapshotter(root, &config.snapshotter, probe)?;

    if config.rootless {
        tracing::debug!("running in rootless mode");
    }

    Ok(Selection::Activate(ActivationPlan {
        driver,
        process_mode,
    }))
}

fn process_mode(config: &OciWorkerConfig) -> Result<ProcessMode> {
    if !config.no_process_sandbox {
        return Ok(ProcessMode::Sandbox);
    }

    tracing::warn!(
        "NoProcessSandbox is enabled. Note that NoProcessSandbox allows build containers to kill (and potentially ptrace) an arbitrary process in the host namespace. NoProcessSandbox should be enabled only when the daemon is running in a container as an unprivileged user."
    );
    if !config.rootless {
        return Err(ActivationError::NoProcessSandboxWithoutRootless);
    }
    Ok(ProcessMode::NoSandbox)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::Path;

    use super::{ProcessMode, Selection, SkipReason, select};
    use crate::config::OciWorkerConfig;
    use crate::error::ActivationError;
    use crate::logging::capture::CapturedLogs;
    use crate::worker::probe::{EnvironmentProbe, ProbeResult};
    use crate::worker::snapshotter::Snapshotter;

    #[derive(Default)]
    struct StubProbe {
        binaries: Vec<&'static str>,
        overlay: bool,
        executable_calls: Cell<usize>,
    }

    impl EnvironmentProbe for StubProbe {
        fn overlay_supported(&self, _root: &Path) -> ProbeResult {
            if self.overlay {
                ProbeResult::supported()
            } else {
                ProbeResult::unsupported("no overlay")
            }
        }

        fn executable_available(&self, names: &[&str]) -> bool {
            self.executable_calls.set(self.executable_calls.get() + 1);
            names.iter().any(|name| self.binaries.contains(name))
        }
    }

    struct FailingProbe;

    impl EnvironmentProbe for FailingProbe {
        fn overlay_supported(&self, _root: &Path) -> ProbeResult {
            panic!("probe consulted for a disabled worker")
        }

        fn executable_available(&self, _names: &[&str]) -> bool {
            panic!("probe consulted for a disabled worker")
        }
    }

    fn root() -> &'static Path {
        Path::new("/var/lib/rkbd")
    }

    #[test]
    fn test_disabled_never_probes() {
        let config = OciWorkerConfig {
            enabled: Some(false),
            snapshotter: "no-such-driver".to_string(),
            ..Default::default()
        };
        let selection = select(&config, root(), &FailingProbe).unwrap();
        assert_eq!(selection, Selection::Skip(SkipReason::Disabled));
    }

    #[test]
    fn test_auto_without_runtime_skips() {
        let probe = StubProbe::default();
        let selection = select(&OciWorkerConfig::default(), root(), &probe).unwrap();
        assert_eq!(selection, Selection::Skip(SkipReason::RuntimeNotFound));
        assert_eq!(probe.executable_calls.get(), 1);
    }

    #[test]
    fn test_auto_with_fallback_binary() {
        let probe = StubProbe {
            binaries: vec!["buildkit-runc"],
            overlay: true,
            ..Default::default()
        };
        let Selection::Activate(plan) = select(&OciWorkerConfig::default(), root(), &probe).unwrap() else {
            panic!("worker should activate");
        };
        assert_eq!(plan.driver.snapshotter, Snapshotter::Overlayfs);
        assert_eq!(plan.process_mode, ProcessMode::Sandbox);
    }

    #[test]
    fn test_explicit_enable_trusts_caller() {
        let probe = StubProbe::default();
        let config = OciWorkerConfig {
            enabled: Some(true),
            ..Default::default()
        };
        let Selection::Activate(plan) = select(&config, root(), &probe).unwrap() else {
            panic!("worker should activate");
        };
        assert_eq!(probe.executable_calls.get(), 0);
        assert_eq!(plan.driver.snapshotter, Snapshotter::Native);
    }

    #[test]
    fn test_unknown_snapshotter() {
        let config = OciWorkerConfig {
            enabled: Some(true),
            snapshotter: "zfs".to_string(),
            ..Default::default()
        };
        let err = select(&config, root(), &StubProbe::default()).unwrap_err();
        assert!(matches!(err, ActivationError::UnknownSnapshotter(ref name) if name == "zfs"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_no_process_sandbox_requires_rootless() {
        let probe = StubProbe {
            binaries: vec!["runc"],
            overlay: true,
            ..Default::default()
        };
        for enabled in [None, Some(true), Some(false)] {
            for snapshotter in ["auto", "native", "bogus"] {
                let config = OciWorkerConfig {
                    enabled,
                    snapshotter: snapshotter.to_string(),
                    no_process_sandbox: true,
                    rootless: false,
                    ..Default::default()
                };
                assert!(matches!(
                    select(&config, root(), &probe),
                    Err(ActivationError::NoProcessSandboxWithoutRootless)
                ));
            }
        }

        let config = OciWorkerConfig {
            no_process_sandbox: true,
            rootless: true,
            ..Default::default()
        };
        let Selection::Activate(plan) = select(&config, root(), &probe).unwrap() else {
            panic!("worker should activate");
        };
        assert_eq!(plan.process_mode, ProcessMode::NoSandbox);
    }

    #[test]
    fn test_sandbox_warning_precedes_rejection() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let config = OciWorkerConfig {
            enabled: Some(false),
            no_process_sandbox: true,
            rootless: false,
            ..Default::default()
        };

        let result = tracing::subscriber::with_default(subscriber, || {
            select(&config, root(), &FailingProbe)
        });

        assert!(matches!(
            result,
            Err(ActivationError::NoProcessSandboxWithoutRootless)
        ));
        let contents = logs.contents();
        assert!(contents.contains("WARN"), "{contents}");
        assert!(
            contents.contains("NoProcessSandbox is enabled"),
            "{contents}"
        );
    }
}
