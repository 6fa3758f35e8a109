// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - GateProbe CLI
 * Credential-trial engine for enterprise VPN gateways
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gateprobe::config::EngineConfig;
use gateprobe::engine::Engine;
use gateprobe::probes::VendorKind;

#[derive(Parser, Debug)]
#[command(
    name = "gateprobe",
    version,
    about = "Credential-trial engine for enterprise VPN gateways"
)]
struct Cli {
    /// Path to a YAML or JSON config file.
    #[arg(short, long)]
    config: Option<String>,

    /// Input list of host;username;password lines.
    #[arg(short, long)]
    input: Option<String>,

    /// Output file for valid credentials.
    #[arg(short, long)]
    output: Option<String>,

    /// Gateway vendor: fortinet, globalprotect, sonicwall, sophos,
    /// watchguard, cisco or citrix.
    #[arg(long)]
    vendor: Option<VendorKind>,

    /// Initial worker count.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Target request rate per second (0 disables limiting and scaling).
    #[arg(short, long)]
    rate: Option<u32>,

    /// Per-attempt timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Log every valid credential as it is found.
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };

    if let Some(input) = &cli.input {
        config.input_file = input.clone();
    }
    if let Some(output) = &cli.output {
        config.output_file = output.clone();
    }
    if let Some(vendor) = cli.vendor {
        config.vendor = vendor;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(rate) = cli.rate {
        config.rate_limit = rate;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if cli.verbose {
        config.verbose = true;
    }

    config.normalize();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    info!(
        input = %config.input_file,
        output = %config.output_file,
        vendor = %config.vendor,
        "gateprobe starting"
    );

    let engine = Arc::new(Engine::new(config)?);

    // First Ctrl-C drains gracefully; the handler task just flips the token.
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping");
                engine.stop();
            }
        });
    }

    let snap = engine.start().await?;

    println!(
        "done: {} valid, {} invalid, {} errors, {} offline, {} blocked ({} processed)",
        snap.successes, snap.failures, snap.errors, snap.offline, snap.rate_limited, snap.processed
    );
    Ok(())
}
