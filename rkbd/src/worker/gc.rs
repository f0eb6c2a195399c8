use std::path::Path;

use serde::Serialize;

use crate::config::{GcRule, OciWorkerConfig};

/// Cap used when the size of the root filesystem cannot be determined.
pub const DEFAULT_GC_CAP: u64 = 2_000_000_000;

const GB: u64 = 1 << 30;

/// Garbage collection policy handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcPolicy {
    /// When false the rules are kept but the worker must not schedule collection.
    pub enabled: bool,
    pub rules: Vec<GcRule>,
}

/// Derive the GC policy of a worker rooted at `root`.
pub fn assemble(config: &OciWorkerConfig, root: &Path) -> GcPolicy {
    let rules = if !config.gc_policy.is_empty() {
        config.gc_policy.clone()
    } else {
        let keep_bytes = if config.gc_keep_storage > 0 {
            config.gc_keep_storage
        } else {
            detect_default_gc_cap(root)
        };
        vec![GcRule {
            all: true,
            keep_bytes,
            ..Default::default()
        }]
    };

    GcPolicy {
        enabled: config.gc != Some(false),
        rules,
    }
}

/// A tenth of the filesystem holding `root`, rounded up to whole gigabytes.
pub fn detect_default_gc_cap(root: &Path) -> u64 {
    // the root may not be created yet; measure the closest existing ancestor
    let Some(existing) = root.ancestors().find(|dir| dir.exists()) else {
        return DEFAULT_GC_CAP;
    };
    match nix::sys::statvfs::statvfs(existing) {
        Ok(stat) => {
            let disk_size = stat.fragment_size() as u64 * stat.blocks() as u64;
            cap_for_disk_size(disk_size)
        }
        Err(e) => {
            tracing::debug!(
                "failed to stat {}, using default gc cap: {e}",
                existing.display()
            );
            DEFAULT_GC_CAP
        }
    }
}

fn cap_for_disk_size(disk_size: u64) -> u64 {
    let avail = disk_size / 10;
    (avail / GB + 1) * 1_000_000_000
}
