use crate::config::DaemonConfig;
use crate::error::{ActivationError, Result};

use super::Worker;
use super::assembler::WorkerAssembler;
use super::overrides::OciOverrides;
use super::probe::EnvironmentProbe;

/// Options shared by every initializer of one activation pass.
pub struct InitContext<'a> {
    pub overrides: &'a OciOverrides,
    pub probe: &'a dyn EnvironmentProbe,
    pub assembler: &'a dyn WorkerAssembler,
}

pub type InitFn = Box<dyn Fn(&InitContext<'_>, &mut DaemonConfig) -> Result<Vec<Box<dyn Worker>>>>;

pub struct WorkerInitializer {
    pub name: String,
    pub priority: i32,
    pub init: InitFn,
}

impl WorkerInitializer {
    pub fn new<F>(name: impl Into<String>, priority: i32, init: F) -> Self
    where
        F: Fn(&InitContext<'_>, &mut DaemonConfig) -> Result<Vec<Box<dyn Worker>>> + 'static,
    {
        Self {
            name: name.into(),
            priority,
            init: Box::new(init),
        }
    }
}

/// Ordered set of backend initializers.
///
/// Filled once while wiring the daemon, then consumed by a single
/// [`WorkerRegistry::run_all`].
#[derive(Default)]
pub struct WorkerRegistry {
    initializers: Vec<WorkerInitializer>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, initializer: WorkerInitializer) -> &mut Self {
        tracing::debug!(
            "registered worker initializer `{}` with priority {}",
            initializer.name,
            initializer.priority
        );
        self.initializers.push(initializer);
        self
    }

    /// Initializer names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.ordered().iter().map(|init| init.name.as_str()).collect()
    }

    /// Run every initializer by ascending priority, ties in registration order.
    ///
    /// Each initializer works on its own copy of `config`. The first error
    /// aborts the pass; workers activated before it are not torn down here.
    pub fn run_all(&self, ctx: &InitContext<'_>, config: &DaemonConfig) -> Result<Vec<Box<dyn Worker>>> {
        tracing::debug!("running worker initializers {:?}", self.names());
        let mut workers: Vec<Box<dyn Worker>> = Vec::new();
        for initializer in self.ordered() {
            let mut backend_config = config.clone();
            let activated = match (initializer.init)(ctx, &mut backend_config) {
                Ok(activated) => activated,
                Err(e) => {
                    if !workers.is_empty() {
                        let ids = workers.iter().map(|w| w.id()).collect::<Vec<_>>();
                        tracing::error!(
                            "worker initializer `{}` failed after activating {ids:?}",
                            initializer.name
                        );
                    }
                    return Err(ActivationError::Initializer {
                        name: initializer.name.clone(),
                        source: Box::new(e),
                    });
                }
            };

            if activated.is_empty() {
                tracing::info!("worker initializer `{}` did not activate", initializer.name);
            }
            for worker in activated {
                tracing::info!("found worker {} ({})", worker.id(), initializer.name);
                workers.push(worker);
            }
        }
        Ok(workers)
    }

    fn ordered(&self) -> Vec<&WorkerInitializer> {
        let mut ordered = self.initializers.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|init| init.priority);
        ordered
    }
}
