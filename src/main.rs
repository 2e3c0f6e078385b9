use std::sync::Arc;

use parcel_track::api::package_routes;
use parcel_track::carrier::{CainiaoClient, CarrierClient};
use parcel_track::config::{Config, ExtractorKind};
use parcel_track::extract::{AddressExtractor, LlmExtractor, RegexExtractor};
use parcel_track::geo::BingGeocoder;
use parcel_track::llm::{LlmBackend, LlmConfig, create_provider};
use parcel_track::pipeline::Pipeline;
use parcel_track::store::{LibSqlStore, PackageStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("📦 parcel-track v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Database: {}", config.db_path);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn PackageStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );

    // ── Upstream clients ─────────────────────────────────────────────────
    let geocoder = Arc::new(BingGeocoder::new(
        config.geocoder_url.clone(),
        config.bing_api_key.clone(),
        config.upstream_timeout,
    ));
    let carrier: Arc<dyn CarrierClient> = Arc::new(CainiaoClient::new(
        config.carrier_url.clone(),
        config.upstream_timeout,
    ));

    // ── Extractor ────────────────────────────────────────────────────────
    let extractor: Arc<dyn AddressExtractor> = match config.extractor {
        ExtractorKind::Regex => {
            eprintln!("   Extractor: regex");
            Arc::new(RegexExtractor::new())
        }
        ExtractorKind::Llm => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
                eprintln!("Error: ANTHROPIC_API_KEY not set (required for the llm extractor)");
                eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
                std::process::exit(1);
            });
            let llm = create_provider(&LlmConfig {
                backend: LlmBackend::Anthropic,
                api_key: secrecy::SecretString::from(api_key),
                model: config.llm_model.clone(),
            })?;
            eprintln!("   Extractor: llm ({})", config.llm_model);
            Arc::new(LlmExtractor::new(llm))
        }
    };

    // ── Pipeline + HTTP ──────────────────────────────────────────────────
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        extractor,
        geocoder,
        carrier.clone(),
    ));

    let app = package_routes(store, pipeline, carrier);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
