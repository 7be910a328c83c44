//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::iteration::Problem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<JobConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<JobConfig> {
    let config: JobConfig = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Config file if one was given, defaults otherwise, then CLI overrides
pub fn load_config(cli: &Cli) -> Result<JobConfig> {
    let config = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => JobConfig::default(),
    };
    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: JobConfig) -> Result<JobConfig> {
    // Problem
    if let Some(ref values) = cli.values {
        let values = values
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        config.problem = Problem::Values { values };
    }

    // Reconstruction
    if let Some(builder) = cli.builder {
        config.reconstruction.builder = builder;
    }
    if let Some(ref hint) = cli.hint {
        config.reconstruction.hint = Some(hint.clone());
    }
    if let Some(k) = cli.stability {
        config.reconstruction.termination.stability_threshold = Some(k);
    }
    if cli.no_stability {
        config.reconstruction.termination.stability_threshold = None;
    }
    if let Some(bits) = cli.bound_bits {
        config.reconstruction.termination.bound_bits = Some(bits);
    }

    // Primes
    if let Some(policy) = cli.policy {
        config.primes.policy = policy;
    }
    if let Some(source) = cli.source {
        config.primes.source = source;
    }
    if let Some(bits) = cli.prime_bits {
        config.primes.bits = bits;
    }
    if let Some(seed) = cli.seed {
        config.primes.seed = seed;
    }

    // Workers
    if let Some(n) = cli.participants {
        config.workers.participants = n;
    }
    if let Some(mode) = cli.worker_mode {
        config.workers.mode = mode;
    }

    // Distributed
    if let Some(port) = cli.listen_port {
        config.distributed.listen_port = port;
    }
    if let Some(ref hosts) = cli.host_list {
        config.distributed.hosts = parse_host_list(hosts, config.distributed.listen_port);
    }

    // Output
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.show_primes {
        config.output.show_primes = true;
    }

    Ok(config)
}

/// Split a comma-separated host list, adding `default_port` where none is given
pub fn parse_host_list(list: &str, default_port: u16) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|addr| {
            if addr.contains(':') {
                addr.to_string()
            } else {
                format!("{}:{}", addr, default_port)
            }
        })
        .collect()
}
