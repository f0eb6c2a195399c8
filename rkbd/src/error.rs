use thiserror::Error;

pub type Result<T, E = ActivationError> = std::result::Result<T, E>;

/// Errors raised while activating a worker backend.
///
/// An unavailable environment (missing runtime, no overlayfs) is not an error:
/// the backend is skipped instead.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("invalid value {0:?} for worker enablement, expected true, false or auto")]
    InvalidEnabled(String),

    #[error("invalid label {token:?}, expected key=value")]
    InvalidLabel { token: String },

    #[error("unknown snapshotter name: {0:?}")]
    UnknownSnapshotter(String),

    #[error("can't enable NoProcessSandbox without Rootless")]
    NoProcessSandboxWithoutRootless,

    #[error("invalid platforms: {0:?} is not a known os, arch, os/arch or os/arch/variant")]
    InvalidPlatform(String),

    #[error("gc keep storage of {0} MB does not fit in bytes")]
    InvalidKeepStorage(u64),

    #[error("failed to construct worker")]
    Construction(#[source] anyhow::Error),

    #[error("worker initializer `{name}` failed")]
    Initializer {
        name: String,
        #[source]
        source: Box<ActivationError>,
    },
}

impl ActivationError {
    /// Whether this error comes from invalid or contradictory explicit settings.
    pub fn is_configuration(&self) -> bool {
        match self {
            ActivationError::InvalidEnabled(_)
            | ActivationError::InvalidLabel { .. }
            | ActivationError::UnknownSnapshotter(_)
            | ActivationError::NoProcessSandboxWithoutRootless
            | ActivationError::InvalidPlatform(_)
            | ActivationError::InvalidKeepStorage(_) => true,
            ActivationError::Construction(_) => false,
            ActivationError::Initializer { source, .. } => source.is_configuration(),
        }
    }
}
