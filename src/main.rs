//! crtpool CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use crtpool::config::cli::{Cli, ExecutionMode};
use crtpool::config::{toml, validator, JobConfig};
use crtpool::output::{json, text};
use crtpool::stats::Outcome;
use crtpool::Reconstructor;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = toml::load_config(&cli)?;

    // A node service takes its job from the coordinator
    if cli.mode == ExecutionMode::Service {
        return run_service(&config);
    }

    validator::validate_config(&config).context("Configuration validation failed")?;
    if cli.show_config {
        println!("{}", config);
    }
    run_reconstruction(cli.mode, config)
}

/// `RUST_LOG` wins; otherwise info, or debug with `--debug`
fn init_tracing(debug: bool) {
    let default = if debug { "crtpool=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run in service mode (distributed node)
fn run_service(config: &JobConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let service = crtpool::distributed::NodeService::new(config.distributed.listen_port)
            .context("Failed to create node service")?;

        service.run().await
    })
}

fn run_reconstruction(mode: ExecutionMode, config: JobConfig) -> Result<()> {
    let reconstructor = Reconstructor::new(config.clone())?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let (outcome, participants): (Outcome, usize) = match mode {
        ExecutionMode::Sequential => (reconstructor.run_sequential()?, 1),
        ExecutionMode::Local => {
            let outcome = runtime.block_on(reconstructor.run())?;
            (outcome, config.workers.participants)
        }
        ExecutionMode::Coordinator => {
            let hosts = &config.distributed.hosts;
            if hosts.is_empty() {
                anyhow::bail!("Coordinator mode requires --host-list or distributed.hosts");
            }
            let outcome = runtime.block_on(reconstructor.run_remote(hosts))?;
            (outcome, hosts.len())
        }
        ExecutionMode::Service => return run_service(&config),
    };

    text::print_results(&outcome, &config, participants);

    if let Some(ref path) = config.output.json_output {
        let report = json::build_report(&config, participants, &outcome);
        json::write_json_report(path, &report, true)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}
