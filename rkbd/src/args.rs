use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

use crate::worker::flag::Enabled;
use crate::worker::overrides::OciOverrides;

#[derive(Parser, Debug)]
#[command(name = "rkbd", about = "Build daemon for rk8s", version)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, env = "RKBD_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// State directory of the daemon
    #[arg(long, env = "RKBD_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Turn debug logging on
    #[arg(long)]
    pub debug: bool,

    /// Set all workers in rootless mode
    #[arg(long)]
    pub rootless: bool,

    /// Output format of the activated workers
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    #[command(flatten)]
    pub oci: OciWorkerArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Args, Debug, Default)]
pub struct OciWorkerArgs {
    /// Enable oci workers (true/false/auto)
    #[arg(long = "oci-worker", value_name = "true|false|auto")]
    pub enabled: Option<Enabled>,

    /// User-specific annotation labels (com.example.foo=bar)
    #[arg(long = "oci-worker-labels", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// Name of snapshotter (overlayfs, native or auto)
    #[arg(long = "oci-worker-snapshotter", value_name = "NAME")]
    pub snapshotter: Option<String>,

    /// Override supported platforms for worker
    #[arg(long = "oci-worker-platform", value_name = "OS/ARCH")]
    pub platforms: Vec<String>,

    /// Enable rootless mode (defaults to true inside a user namespace)
    #[arg(
        id = "oci_worker_rootless",
        long = "oci-worker-rootless",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub rootless: Option<bool>,

    /// Use the host PID namespace and procfs (WARNING: allows build containers to kill (and potentially ptrace) an arbitrary process in the host namespace)
    #[arg(
        long = "oci-worker-no-process-sandbox",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub no_process_sandbox: Option<bool>,

    /// Enable automatic garbage collection on worker
    #[arg(long = "oci-worker-gc", num_args = 0..=1, default_missing_value = "true")]
    pub gc: Option<bool>,

    /// Amount of storage GC keep locally (MB)
    #[arg(long = "oci-worker-gc-keepstorage", value_name = "MB")]
    pub gc_keep_storage: Option<u64>,
}

impl Cli {
    /// Collect the OCI worker flags the user actually passed.
    ///
    /// Without any rootless flag, a process inside a user namespace defaults
    /// to rootless.
    pub fn oci_overrides(&self, in_user_ns: bool) -> OciOverrides {
        let rootless = self
            .oci
            .rootless
            .or(self.rootless.then_some(true))
            .or(in_user_ns.then_some(true));

        OciOverrides {
            enabled: self.oci.enabled,
            labels: self.oci.labels.clone(),
            snapshotter: self.oci.snapshotter.clone(),
            platforms: self.oci.platforms.clone(),
            rootless,
            no_process_sandbox: self.oci.no_process_sandbox,
            gc: self.oci.gc,
            gc_keep_storage_mb: self.oci.gc_keep_storage,
        }
    }
}
