use anyhow::{Context, bail};
use clap::Parser;

use rkbd::args::{Cli, Format};
use rkbd::worker::assembler::OciWorkerAssembler;
use rkbd::worker::probe::{HostProbe, running_in_user_ns};
use rkbd::{DaemonConfig, InitContext, default_registry, logging, report};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logging = logging::init(cli.debug);

    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if config.debug && !cli.debug {
        logging.enable_debug()?;
    }
    config.debug |= cli.debug;

    let in_user_ns = running_in_user_ns();
    if in_user_ns {
        tracing::debug!("running in a user namespace");
    }
    let overrides = cli.oci_overrides(in_user_ns);

    let registry = default_registry();
    let ctx = InitContext {
        overrides: &overrides,
        probe: &HostProbe,
        assembler: &OciWorkerAssembler,
    };
    let workers = registry
        .run_all(&ctx, &config)
        .context("Failed to activate workers")?;
    if workers.is_empty() {
        bail!("no worker found, enable a worker backend or install runc");
    }

    match cli.format {
        Format::Table => println!("{}", report::render_table(&workers)),
        Format::Json => println!("{}", report::render_json(&workers)?),
    }
    Ok(())
}
