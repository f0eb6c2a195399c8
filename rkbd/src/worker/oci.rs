use std::collections::BTreeMap;
use std::path::PathBuf;

use oci_spec::image::Platform;

use crate::config::DaemonConfig;
use crate::error::{ActivationError, Result};

use super::Worker;
use super::gc::{self, GcPolicy};
use super::overrides::resolve;
use super::platform::{host_platform, parse_platforms};
use super::registry::InitContext;
use super::resolver::RegistryResolver;
use super::selector::{ProcessMode, Selection, select};
use super::snapshotter::DriverChoice;

pub static OCI_WORKER: &str = "oci";

/// Validated options for constructing an OCI worker.
#[derive(Debug, Clone)]
pub struct WorkerOpt {
    pub root: PathBuf,
    pub driver: DriverChoice,
    pub rootless: bool,
    pub process_mode: ProcessMode,
    pub labels: BTreeMap<String, String>,
    pub platforms: Vec<Platform>,
    pub gc_policy: GcPolicy,
    pub resolver: RegistryResolver,
}

/// Initializer of the OCI worker: merge overrides, select, derive policy and assemble.
pub fn oci_worker_initializer(ctx: &InitContext<'_>, config: &mut DaemonConfig) -> Result<Vec<Box<dyn Worker>>> {
    config.workers.oci = resolve(config.workers.oci.clone(), ctx.overrides)?;
    let cfg = &config.workers.oci;

    let plan = match select(cfg, &config.root, ctx.probe)? {
        Selection::Activate(plan) => plan,
        Selection::Skip(reason) => {
            tracing::debug!("oci worker not activated: {reason:?}");
            return Ok(Vec::new());
        }
    };

    let platforms = if cfg.platforms.is_empty() {
        vec![host_platform()]
    } else {
        parse_platforms(&cfg.platforms)?
    };

    let opt = WorkerOpt {
        root: config.root.clone(),
        driver: plan.driver,
        rootless: cfg.rootless,
        process_mode: plan.process_mode,
        labels: cfg.labels.clone(),
        platforms,
        gc_policy: gc::assemble(cfg, &config.root),
        resolver: RegistryResolver::new(config),
    };

    let worker = ctx
        .assembler
        .assemble(opt)
        .map_err(ActivationError::Construction)?;
    Ok(vec![worker])
}
