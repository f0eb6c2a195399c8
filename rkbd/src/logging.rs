use std::io;

use anyhow::Context;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Handle on the installed log filter.
///
/// Logging starts before the config file is read, so a `debug = true` from the
/// config can only raise the level afterwards.
pub struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl Logging {
    /// Switch to debug level unless `RUST_LOG` picked the filter.
    pub fn enable_debug(&self) -> anyhow::Result<()> {
        if self.from_env {
            return Ok(());
        }
        self.handle
            .reload(level_filter(true))
            .context("failed to raise log level to debug")
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `debug`.
pub fn init(debug: bool) -> Logging {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (level_filter(debug), false),
    };
    // logs go to stderr, stdout carries the worker report
    let (subscriber, logging) = subscriber(filter, from_env, io::stderr);
    subscriber.init();
    logging
}

fn subscriber<W>(
    filter: EnvFilter,
    from_env: bool,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, Logging)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, Logging { handle, from_env })
}

fn level_filter(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { "debug" } else { "info" })
}


#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::capture::CapturedLogs;
    use super::{level_filter, subscriber};
    use crate::config::DaemonConfig;

    #[test]
    fn test_config_load_is_logged() {
        let tmp_dir = tempdir().unwrap();
        let missing = tmp_dir.path().join("rkbd.toml");
        let logs = CapturedLogs::default();
        let (subscriber, _logging) = subscriber(level_filter(true), false, logs.clone());

        tracing::subscriber::with_default(subscriber, || {
            DaemonConfig::load(Some(&missing)).unwrap();
        });

        let contents = logs.contents();
        assert!(contents.contains("not found, using defaults"), "{contents}");
    }

    #[test]
    fn test_enable_debug_after_init() {
        let logs = CapturedLogs::default();
        let (subscriber, logging) = subscriber(level_filter(false), false, logs.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden before reload");
            tracing::info!("shown at info");
            logging.enable_debug().unwrap();
            tracing::debug!("shown after reload");
        });

        let contents = logs.contents();
        assert!(!contents.contains("hidden before reload"), "{contents}");
        assert!(contents.contains("shown at info"), "{contents}");
        assert!(contents.contains("shown after reload"), "{contents}");
    }

    #[test]
    fn test_env_filter_is_kept() {
        let logs = CapturedLogs::default();
        let (subscriber, logging) = subscriber(level_filter(false), true, logs.clone());

        tracing::subscriber::with_default(subscriber, || {
            logging.enable_debug().unwrap();
            tracing::debug!("still filtered");
        });

        assert!(!logs.contents().contains("still filtered"));
    }
}
