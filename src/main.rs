// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Thin `set pppoe ...` command-line front end over
//! [`pppoe_link_rs::cfg::config::Config`] (spec §6). Binding the wire
//! protocol and state machines to a running link-framework host (real
//! netgraph sockets, a live `LinkHost`) is an external collaborator's job;
//! this binary only edits and validates the on-disk configuration a host
//! daemon would load at startup.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pppoe_link_rs::cfg::{
    cli::{SetPppoeCli, apply_set_command, resolve_config_path},
    config::Config,
    logger::init_logger,
};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "pppoectl", about = "Configure a PPPoE link-layer subsystem")]
struct Cli {
    /// Path to the YAML config file this subsystem's host daemon loads.
    #[arg(long, default_value = "pppoe.yaml")]
    config: String,

    /// Path to the logger's own YAML config. Logging is skipped entirely
    /// if this file is absent.
    #[arg(long, default_value = "pppoe_logger.yaml")]
    log_config: String,

    /// Interface name of the link to edit; a link is created if none
    /// with this name exists yet.
    #[arg(long)]
    iface: String,

    #[command(flatten)]
    set: SetPppoeCli,
}

fn load_or_default(path: &str) -> Result<Config> {
    match resolve_config_path(path) {
        Ok(abs) => Config::load_from_file(abs),
        Err(_) => Ok(Config::default()),
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match resolve_config_path(&cli.log_config) {
        Ok(abs) => {
            let path = abs.to_str().context("log config path is not valid UTF-8")?;
            Some(init_logger(path)?)
        },
        Err(_) => None,
    };

    let mut cfg = load_or_default(&cli.config).context("failed to load config")?;

    let link = match cfg.links.iter_mut().find(|l| l.iface == cli.iface) {
        Some(existing) => existing,
        None => {
            cfg.links.push(pppoe_link_rs::cfg::config::LinkConfig {
                iface: cli.iface.clone(),
                ..Default::default()
            });
            cfg.links.last_mut().expect("just pushed")
        },
    };

    apply_set_command(link, &cli.set.command)?;
    cfg.validate().context("config failed validation after edit")?;

    let serialized = serde_yaml::to_string(&cfg).context("failed to serialize config")?;
    std::fs::write(&cli.config, serialized)
        .with_context(|| format!("failed to write {}", cli.config))?;

    info!(iface = %cli.iface, "applied pppoe config change");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pppoectl failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
