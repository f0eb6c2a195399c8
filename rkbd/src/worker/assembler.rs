use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use oci_spec::image::Platform;
use rand::{Rng, distr::Alphanumeric};

use super::Worker;
use super::gc::GcPolicy;
use super::oci::WorkerOpt;
use super::snapshotter::Snapshotter;

pub static LABEL_EXECUTOR: &str = "rk8s.io/worker.executor";
pub static LABEL_SNAPSHOTTER: &str = "rk8s.io/worker.snapshotter";
pub static LABEL_HOSTNAME: &str = "rk8s.io/worker.hostname";
static WORKER_ID_FILE: &str = "workerid";

/// Turns validated options into a runnable worker.
pub trait WorkerAssembler {
    fn assemble(&self, opt: WorkerOpt) -> Result<Box<dyn Worker>>;
}

/// Prepares the on-disk state of an OCI worker.
///
/// Container execution and snapshotting happen in the runtime, not here.
#[derive(Debug, Default, Clone, Copy)]
pub struct OciWorkerAssembler;

impl WorkerAssembler for OciWorkerAssembler {
    fn assemble(&self, opt: WorkerOpt) -> Result<Box<dyn Worker>> {
        fs::create_dir_all(&opt.root)
            .with_context(|| format!("Failed to create root directory {}", opt.root.display()))?;
        let snapshotter_root = opt.driver.snapshotter_root(&opt.root);
        fs::create_dir_all(&snapshotter_root).with_context(|| {
            format!(
                "Failed to create snapshotter directory {}",
                snapshotter_root.display()
            )
        })?;

        let id = load_or_create_worker_id(&opt.root)?;
        let labels = worker_labels(&opt);
        Ok(Box::new(OciWorker { id, labels, opt }))
    }
}

pub struct OciWorker {
    id: String,
    labels: BTreeMap<String, String>,
    opt: WorkerOpt,
}

impl Worker for OciWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn platforms(&self) -> &[Platform] {
        &self.opt.platforms
    }

    fn gc_policy(&self) -> &GcPolicy {
        &self.opt.gc_policy
    }

    fn snapshotter(&self) -> Snapshotter {
        self.opt.driver.snapshotter
    }
}

/// Built-in labels first, so that user labels win on conflict.
fn worker_labels(opt: &WorkerOpt) -> BTreeMap<String, String> {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    let mut labels = BTreeMap::from([
        (LABEL_EXECUTOR.to_string(), "oci".to_string()),
        (
            LABEL_SNAPSHOTTER.to_string(),
            opt.driver.snapshotter.name().to_string(),
        ),
        (LABEL_HOSTNAME.to_string(), hostname),
    ]);
    labels.extend(opt.labels.clone());
    labels
}

/// The worker id survives restarts, so it is persisted under the root.
fn load_or_create_worker_id(root: &Path) -> Result<String> {
    let path = root.join(WORKER_ID_FILE);
    if path.exists() {
        let id = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read worker id {}", path.display()))?;
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    let id = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(25)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect::<String>();
    fs::write(&path, &id)
        .with_context(|| format!("Failed to write worker id {}", path.display()))?;
    Ok(id)
}
