use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::mount::{MsFlags, mount, umount};
use nix::sys::stat::Mode;
use once_cell::sync::Lazy;

static PROC_FILESYSTEMS: &str = "/proc/filesystems";
static PROC_UID_MAP: &str = "/proc/self/uid_map";
static D_TYPE_MARKER: &str = "d_type";

static RUNNING_IN_USER_NS: Lazy<bool> = Lazy::new(|| match fs::read_to_string(PROC_UID_MAP) {
    Ok(uid_map) => uid_map_in_user_ns(&uid_map),
    Err(e) => {
        tracing::debug!("failed to read {PROC_UID_MAP}: {e}");
        false
    }
});

/// Outcome of a best-effort capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub supported: bool,
    /// Why the capability is missing. Only meant for logs.
    pub diagnostic: String,
}

impl ProbeResult {
    pub fn supported() -> Self {
        Self {
            supported: true,
            diagnostic: String::new(),
        }
    }

    pub fn unsupported(diagnostic: impl Into<String>) -> Self {
        Self {
            supported: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Read-only questions about the host the daemon runs on.
///
/// Implementations must not fail: any error is folded into a negative answer.
pub trait EnvironmentProbe {
    /// Whether an overlayfs snapshotter can work with state under `root`.
    fn overlay_supported(&self, root: &Path) -> ProbeResult;

    /// Whether any of `names` resolves on `PATH`. Candidates are tried in order.
    fn executable_available(&self, names: &[&str]) -> bool;
}

/// Probe backed by the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl EnvironmentProbe for HostProbe {
    fn overlay_supported(&self, root: &Path) -> ProbeResult {
        match check_overlay(root) {
            Ok(()) => ProbeResult::supported(),
            Err(e) => ProbeResult::unsupported(format!("{e:#}")),
        }
    }

    fn executable_available(&self, names: &[&str]) -> bool {
        for name in names {
            match which::which(name) {
                Ok(path) => {
                    tracing::debug!("found {name} at {}", path.display());
                    return true;
                }
                Err(e) => tracing::debug!("{name} is not available: {e}"),
            }
        }
        false
    }
}

/// Whether the process runs inside a user namespace, e.g. as rootless.
pub fn running_in_user_ns() -> bool {
    *RUNNING_IN_USER_NS
}

fn uid_map_in_user_ns(uid_map: &str) -> bool {
    // an empty map is the initial state of a freshly created user namespace
    let Some(line) = uid_map.lines().next() else {
        return true;
    };
    let fields = line
        .split_whitespace()
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>();
    match fields.as_deref() {
        Ok([inside, outside, count]) => !(*inside == 0 && *outside == 0 && *count == 4294967295),
        _ => false,
    }
}

fn check_overlay(root: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create root directory {}", root.display()))?;

    let filesystems = fs::read_to_string(PROC_FILESYSTEMS)
        .with_context(|| format!("failed to read {PROC_FILESYSTEMS}"))?;
    if !filesystems
        .lines()
        .any(|line| line.split_whitespace().last() == Some("overlay"))
    {
        bail!("overlay is not listed in {PROC_FILESYSTEMS}");
    }

    let scratch = ScratchDir::new(root.join(format!("overlayfs-check-{}", std::process::id())));
    let lower1 = scratch.dir.join("lower1");
    let lower2 = scratch.dir.join("lower2");
    let upper = scratch.dir.join("upper");
    let work = scratch.dir.join("work");
    let merged = scratch.dir.join("merged");
    for dir in [&lower1, &lower2, &upper, &work, &merged] {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    check_d_type(&scratch.dir)?;

    // two lower directories, since multi-layer lowerdir is what snapshots need
    let options = format!(
        "lowerdir={}:{},upperdir={},workdir={}",
        lower2.display(),
        lower1.display(),
        upper.display(),
        work.display()
    );
    mount::<str, Path, str, str>(
        Some("overlay"),
        &merged,
        Some("overlay"),
        MsFlags::empty(),
        Some(options.as_str()),
    )
    .with_context(|| format!("failed to mount overlay at {}", merged.display()))?;
    umount(&merged).with_context(|| format!("failed to unmount {}", merged.display()))?;

    Ok(())
}

/// Overlayfs needs the backing filesystem to report file types in directory
/// entries, which e.g. xfs formatted with `ftype=0` does not.
fn check_d_type(dir: &Path) -> anyhow::Result<()> {
    let marker = dir.join(D_TYPE_MARKER);
    fs::write(&marker, b"").with_context(|| format!("failed to create {}", marker.display()))?;

    let mut entries = Dir::open(
        dir,
        OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
        Mode::empty(),
    )
    .with_context(|| format!("failed to open {}", dir.display()))?;
    for entry in entries.iter() {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        if entry.file_name().to_bytes() != D_TYPE_MARKER.as_bytes() {
            continue;
        }
        if entry.file_type().is_none() {
            bail!(
                "backing filesystem of {} does not support d_type",
                dir.display()
            );
        }
        return Ok(());
    }
    bail!("{} is missing from its directory listing", marker.display())
}

/// Removes the probe directory when dropped.
struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    fn new(dir: PathBuf) -> Self {
        ScratchDir { dir }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.dir)
        {
            tracing::error!(
                "Failed to remove probe directory {}: {e}",
                self.dir.display()
            );
        }
    }
}
