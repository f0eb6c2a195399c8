pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod worker;

// re-export selected public API
pub use config::DaemonConfig;
pub use error::ActivationError;
pub use worker::registry::{InitContext, WorkerInitializer, WorkerRegistry};
pub use worker::{Worker, default_registry};
