use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, EnvFilter};
use std::net::SocketAddr;
use std::sync::Arc;
use llama_engines::api::{self, AppState};
use llama_engines::config::Config;
use llama_engines::model::LanguageModel;
use llama_engines::registry::Registry;
use llama_engines::variants::Checkpoint;


#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
dotenv().ok();
let cfg = <Config as clap::Parser>::parse();


// logs
let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
fmt().with_env_filter(filter).init();


// metrics
let metrics = PrometheusBuilder::new().install_recorder()?;


// weights roots are read once here and passed down from then on
let roots = cfg.weight_roots();
let opts = cfg.load_options();
let registry = Registry::global();


for variant in cfg.preload.iter().copied() {
let (roots, opts) = (roots.clone(), opts.clone());
tokio::task::spawn_blocking(move || registry.engine(variant, &roots, &opts)).await??;
tracing::info!(model = %variant, "preloaded");
}


let loader: Arc<api::Loader> = Arc::new(move |cp: &Checkpoint| LanguageModel::load(cp, &roots, &opts));
let app = api::routes(AppState { registry, loader, metrics: Some(metrics), max_completions: cfg.max_completions });
let addr: SocketAddr = cfg.bind_addr.parse()?;


tracing::info!(%addr, "listening");
axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
Ok(())
}
