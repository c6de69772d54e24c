use crate::{
    error::EngineError,
    model::LanguageModel,
    registry::Registry,
    variants::{Checkpoint, Variant},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

/// Builds a model the first time its variant is requested.
pub type Loader = dyn Fn(&Checkpoint) -> Result<LanguageModel, EngineError> + Send + Sync;

#[derive(Clone)]
pub struct AppState {
    pub registry: &'static Registry,
    pub loader: Arc<Loader>,
    pub metrics: Option<PrometheusHandle>,
    /// Upper bound on `n` per completion request.
    pub max_completions: usize,
}

#[derive(Deserialize)]
pub struct CompletionReq {
    pub model: String,
    pub prompt: String,
    #[serde(default = "one")]
    pub n: usize,
    pub temperature: Option<f32>,
}

fn one() -> usize {
    1
}

#[derive(Deserialize)]
pub struct BestReq {
    pub model: String,
    pub prompt: String,
}

#[derive(Serialize, Deserialize)]
pub struct CompletionResp {
    pub model: String,
    pub completions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct BestResp {
    pub model: String,
    pub completion: String,
}

#[derive(Serialize, Deserialize)]
pub struct ModelInfo {
    pub model: String,
    pub checkpoint: String,
    pub env: String,
    pub loaded: bool,
}

pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            EngineError::UnknownVariant(_)
            | EngineError::InvalidCompletionCount
            | EngineError::TooManyCompletions { .. } => StatusCode::BAD_REQUEST,
            EngineError::MissingDependency { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/completions", post(completions))
        .route("/v1/best", post(best))
        .route("/v1/models", get(models))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// Load (if needed) and run `f` on the blocking pool.
async fn with_model<T, F>(state: &AppState, variant: Variant, f: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce(&LanguageModel) -> Result<T, EngineError> + Send + 'static,
{
    let registry = state.registry;
    let loader = state.loader.clone();
    let t0 = Instant::now();
    let res = tokio::task::spawn_blocking(move || {
        let model = registry.get_or_load(variant, |cp| loader(cp))?;
        f(model.as_ref())
    })
    .await
    .map_err(|e| EngineError::Engine(e.into()))
    .and_then(|r| r);

    let model = variant.as_str();
    metrics::counter!("lm_requests_total", "model" => model).increment(1);
    metrics::histogram!("lm_generate_seconds", "model" => model).record(t0.elapsed().as_secs_f64());
    if let Err(e) = &res {
        metrics::counter!("lm_request_errors_total", "model" => model).increment(1);
        tracing::warn!(%model, error = %e, "request failed");
    }
    res
}

async fn completions(
    State(state): State<AppState>,
    Json(req): Json<CompletionReq>,
) -> Result<Json<CompletionResp>, ApiError> {
    let variant: Variant = req.model.parse()?;
    let CompletionReq { prompt, n, temperature, .. } = req;
    if n > state.max_completions {
        return Err(EngineError::TooManyCompletions { requested: n, max: state.max_completions }.into());
    }
    let completions = with_model(&state, variant, move |m| m.generate_many(&prompt, n, temperature)).await?;
    Ok(Json(CompletionResp { model: variant.to_string(), completions }))
}

async fn best(
    State(state): State<AppState>,
    Json(req): Json<BestReq>,
) -> Result<Json<BestResp>, ApiError> {
    let variant: Variant = req.model.parse()?;
    let prompt = req.prompt;
    let completion = with_model(&state, variant, move |m| m.generate_best(&prompt)).await?;
    Ok(Json(BestResp { model: variant.to_string(), completion }))
}

async fn models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    let list = Variant::ALL
        .into_iter()
        .map(|v| {
            let cp = v.checkpoint();
            ModelInfo {
                model: v.to_string(),
                checkpoint: cp.name.to_string(),
                env: cp.env_var().to_string(),
                loaded: state.registry.is_loaded(v),
            }
        })
        .collect();
    Json(list)
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
