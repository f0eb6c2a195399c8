use std::collections::BTreeMap;

use crate::config::{AUTO_SNAPSHOTTER, OciWorkerConfig};
use crate::error::{ActivationError, Result};

use super::flag::Enabled;

/// Multiplier from the caller-facing megabytes to bytes.
pub const MB: u64 = 1_000_000;

/// Runtime overrides for the OCI worker, usually collected from CLI flags.
///
/// Every field is applied only when the caller supplied it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OciOverrides {
    pub enabled: Option<Enabled>,
    /// Raw `key=value` tokens.
    pub labels: Vec<String>,
    pub snapshotter: Option<String>,
    pub platforms: Vec<String>,
    pub rootless: Option<bool>,
    pub no_process_sandbox: Option<bool>,
    pub gc: Option<bool>,
    pub gc_keep_storage_mb: Option<u64>,
}

/// Parse a batch of `key=value` tokens. Fails on the first malformed token.
pub fn parse_labels(tokens: &[String]) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| ActivationError::InvalidLabel {
                token: token.clone(),
            })?;
        labels.insert(key.trim().to_string(), value.to_string());
    }
    Ok(labels)
}

/// Merge `overrides` into `base`.
///
/// All fallible conversions run before `base` is touched, so an error never
/// leaves a half-merged config behind.
pub fn resolve(mut base: OciWorkerConfig, overrides: &OciOverrides) -> Result<OciWorkerConfig> {
    let labels = parse_labels(&overrides.labels)?;
    let keep_storage = overrides
        .gc_keep_storage_mb
        .map(|mb| {
            mb.checked_mul(MB)
                .ok_or(ActivationError::InvalidKeepStorage(mb))
        })
        .transpose()?;

    if let Some(enabled) = overrides.enabled {
        base.enabled = enabled.as_option();
    }
    base.labels.extend(labels);
    if let Some(snapshotter) = &overrides.snapshotter {
        base.snapshotter = snapshotter.clone();
    }
    if base.snapshotter.is_empty() {
        base.snapshotter = AUTO_SNAPSHOTTER.to_string();
    }
    if !overrides.platforms.is_empty() {
        base.platforms = overrides.platforms.clone();
    }
    if let Some(rootless) = overrides.rootless {
        base.rootless = rootless;
    }
    if let Some(no_process_sandbox) = overrides.no_process_sandbox {
        base.no_process_sandbox = no_process_sandbox;
    }
    if let Some(gc) = overrides.gc {
        base.gc = Some(gc);
    }
    if let Some(keep_storage) = keep_storage {
        base.gc_keep_storage = keep_storage;
    }

    Ok(base)
}
