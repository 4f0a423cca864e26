#![allow(missing_docs)]

//! Petaline — privacy-first flower shop support agent.
//!
//! Wires the order store, privacy service client and model client into the
//! four-stage pipeline, then hands control to the interactive shell (or
//! runs a single request with `--once`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;
use tracing::info;

use petaline::config::Config;
use petaline::cryptor::{Cryptor, HttpCryptor};
use petaline::logging;
use petaline::model::gemini::GeminiModel;
use petaline::model::Model;
use petaline::pipeline::Pipeline;
use petaline::shell::Shell;
use petaline::store::OrderStore;

#[derive(Debug, Parser)]
#[command(name = "petaline", version, about = "Privacy-first flower shop support agent")]
struct Cli {
    /// Path to the configuration file (default: petaline.toml if present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Process one request and exit instead of starting the shell.
    #[arg(long, value_name = "TEXT")]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let store = Arc::new(RwLock::new(OrderStore::load(
        &config.store.orders_path,
        &config.store.bundles_path,
    )));
    let cryptor: Arc<dyn Cryptor> =
        Arc::new(HttpCryptor::new(&config.cryptor).context("failed to build privacy client")?);
    let model: Arc<dyn Model> =
        Arc::new(GeminiModel::new(&config.model).context("failed to build model client")?);

    let pipeline = Pipeline::new(Arc::clone(&cryptor), model, Arc::clone(&store));
    let mut shell = Shell::new(pipeline, store, cryptor, config.cryptor.tenant_id.clone());

    info!(model = %config.model.model, "petaline ready");
    match cli.once {
        Some(text) => shell.run_once(&text).await,
        None => shell.run().await,
    }
}
