// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use vshl_panel::config::PanelConfig;
use vshl_panel::run::{init_tracing, run};

#[tokio::main]
async fn main() {
    let config = PanelConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        error!("fatal: failed to install rustls crypto provider");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
