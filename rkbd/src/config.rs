use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub static AUTO_SNAPSHOTTER: &str = "auto";
static ROOT_PATH: &str = "/var/lib/rkbd";
static CONFIG_PATH: &str = "/etc/rkbd/rkbd.toml";

/// Persisted daemon configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub root: PathBuf,
    pub debug: bool,
    pub workers: WorkersConfig,
    /// Per registry host settings, e.g. `[registries."docker.io"]`.
    pub registries: BTreeMap<String, RegistryConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub oci: OciWorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OciWorkerConfig {
    /// `None` lets the daemon decide by probing for a runtime binary.
    pub enabled: Option<bool>,
    pub snapshotter: String,
    pub labels: BTreeMap<String, String>,
    pub platforms: Vec<String>,
    pub rootless: bool,
    pub no_process_sandbox: bool,
    pub gc: Option<bool>,
    /// Bytes. Zero means not configured.
    pub gc_keep_storage: u64,
    pub gc_policy: Vec<GcRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcRule {
    pub filters: Vec<String>,
    pub all: bool,
    /// Seconds.
    pub keep_duration: u64,
    pub keep_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub mirrors: Vec<String>,
    pub http: bool,
    pub insecure: bool,
}

impl Default for OciWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            snapshotter: AUTO_SNAPSHOTTER.to_string(),
            labels: BTreeMap::new(),
            platforms: Vec::new(),
            rootless: false,
            no_process_sandbox: false,
            gc: None,
            gc_keep_storage: 0,
            gc_policy: Vec::new(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            debug: false,
            workers: WorkersConfig::default(),
            registries: BTreeMap::new(),
        }
    }
}

impl DaemonConfig {
    /// Load the config file at `path`, or at the default location when `None`.
    ///
    /// A missing file yields the defaults; it is never created.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        if !path.exists() {
            tracing::debug!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        confy::load_path::<Self>(&path)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }
}

fn is_root() -> bool {
    nix::unistd::getuid().is_root()
}

pub fn default_root() -> PathBuf {
    if is_root() {
        return PathBuf::from(ROOT_PATH);
    }
    dirs::data_dir()
        .map(|dir| dir.join("rk8s").join("rkbd"))
        .unwrap_or_else(|| PathBuf::from(ROOT_PATH))
}

pub fn default_config_path() -> PathBuf {
    if is_root() {
        return PathBuf::from(CONFIG_PATH);
    }
    dirs::config_dir()
        .map(|dir| dir.join("rk8s").join("rkbd.toml"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_PATH))
}
