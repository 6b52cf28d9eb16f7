/// meaning-lens server
///
/// Classifies uploaded photos and explains the predicted category. Served by a
/// synchronous tiny_http server; every request is handled start to finish on
/// its own thread.
///
/// Run with:
///   cargo run --bin meaning-lens-server --release
///
/// Endpoints:
///   POST    /predict   multipart form: image, augment, to_gray
///   OPTIONS /predict   CORS pre-flight
///   GET     /health    liveness and label count

mod handlers;
mod routes;
mod util;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tiny_http::Server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meaning_lens::{
    DenseOracle, LabelTaxonomy, MeaningTable, ResultEncoder, ServerConfig, ServiceContext,
    TaxonomySource,
};

fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meaning_lens=info,meaning_lens_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Builds the read-only service context. Any inconsistency between model,
/// taxonomy and configuration aborts start-up.
fn build_context(config: &ServerConfig) -> Result<ServiceContext> {
    let oracle = DenseOracle::load(&config.model_path)
        .with_context(|| format!("loading model {}", config.model_path.display()))?;

    let taxonomy = match &config.taxonomy {
        TaxonomySource::Manifest(path) => LabelTaxonomy::load_manifest(path),
        TaxonomySource::DatasetDir(dir) => LabelTaxonomy::from_dataset_dir(dir),
    }
    .context("loading label taxonomy")?;

    let meanings = MeaningTable::load_dir(&config.meanings_dir, &taxonomy)
        .context("loading category meanings")?;
    let encoder = ResultEncoder::new(config.jpeg_quality)?;

    ServiceContext::new(Box::new(oracle), taxonomy, meanings, encoder)
        .context("model and taxonomy disagree")
}

fn run() -> Result<()> {
    let config = ServerConfig::from_env().context("reading configuration")?;
    info!(?config, "starting meaning-lens server");

    let ctx = Arc::new(build_context(&config)?);
    let server = Server::http(&config.bind_addr)
        .map_err(|e| anyhow!("failed to bind {}: {e}", config.bind_addr))?;
    info!(addr = %config.bind_addr, labels = ctx.taxonomy().len(), "listening");

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || {
            routes::dispatch(request, ctx);
        });
    }
    Ok(())
}
