pub mod assembler;
pub mod flag;
pub mod gc;
pub mod oci;
pub mod overrides;
pub mod platform;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod snapshotter;

use std::collections::BTreeMap;

use oci_spec::image::Platform;

use gc::GcPolicy;
use oci::{OCI_WORKER, oci_worker_initializer};
use registry::{WorkerInitializer, WorkerRegistry};
use snapshotter::Snapshotter;

/// An activated build worker.
pub trait Worker {
    fn id(&self) -> &str;

    fn labels(&self) -> &BTreeMap<String, String>;

    fn platforms(&self) -> &[Platform];

    fn gc_policy(&self) -> &GcPolicy;

    fn snapshotter(&self) -> Snapshotter;
}

/// Registry with every worker backend this daemon ships.
pub fn default_registry() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register(WorkerInitializer::new(OCI_WORKER, 0, oci_worker_initializer));
    registry
}
