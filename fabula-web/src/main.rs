//! Servidor web Axum para análise de fabulas: entidades de arma, números de série e calibres

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{SecondsFormat, Utc};
use fabula_core::{
    DocumentAnalysis, EntityRecognizer, ExtractedAttribute, Extractor, LexiconRecognizer, RecognizeError,
    ServiceConfig, StatsManager,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Estado compartilhado da aplicação
struct AppState {
    extractor: Extractor,
    recognizer: Box<dyn EntityRecognizer>,
    /// `None` se o arquivo de estatísticas não pôde ser aberto
    stats: Option<StatsManager>,
}

#[derive(Deserialize)]
struct FabulaInput {
    fabula: String,
}

#[derive(Deserialize)]
struct FabulaBatchInput {
    fabulas: Vec<FabulaInput>,
}

#[derive(Serialize)]
struct FabulaOutput {
    entities: Vec<(String, String)>,
    weapon_serial_numbers: Vec<ExtractedAttribute>,
    weapon_calibers: Vec<ExtractedAttribute>,
}

impl From<DocumentAnalysis> for FabulaOutput {
    fn from(analysis: DocumentAnalysis) -> Self {
        Self {
            entities: analysis.entities,
            weapon_serial_numbers: analysis.serial_numbers,
            weapon_calibers: analysis.calibers,
        }
    }
}

#[derive(Serialize)]
struct FabulaBatchOutput {
    results: Vec<FabulaOutput>,
    processed_ctr: usize,
    failed_ctr: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    let (serial, caliber) = config.load_tables()?;
    let extractor = Extractor::with_tables(serial, caliber, config.engine);
    for err in extractor.serial_table().errors().iter().chain(extractor.caliber_table().errors()) {
        warn!("{}", err);
    }
    info!(
        serial_patterns = extractor.serial_table().patterns().len(),
        caliber_patterns = extractor.caliber_table().patterns().len(),
        context_window = config.engine.context_window,
        "padrões compilados"
    );

    let stats = match StatsManager::open(&config.stats_file) {
        Ok(stats) => Some(stats),
        Err(e) => {
            error!("estatísticas indisponíveis: {}", e);
            None
        }
    };

    let state = Arc::new(AppState { extractor, recognizer: Box::new(LexiconRecognizer::new()), stats });

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("🚀 Servidor de fabulas iniciado em http://{}", config.bind_addr());
    axum::serve(listener, app(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(stats) = &state.stats {
        match stats.save() {
            Ok(()) => info!(path = %stats.path().display(), "estatísticas gravadas"),
            Err(e) => error!("falha ao gravar estatísticas no desligamento: {}", e),
        }
    }
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze_fabula", post(analyze_handler))
        .route("/analyze_fabulas_batch", post(analyze_batch_handler))
        .route("/stat", get(stat_handler))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("falha ao aguardar sinal de desligamento: {}", e);
    }
    info!("desligando");
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

/// Estado dos componentes
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.stats.is_none() {
        error!("health check: estatísticas não inicializadas");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "error",
                "message": "Componentes obrigatórios indisponíveis",
                "details": ["StatsManager não inicializado"],
                "timestamp": timestamp(),
            })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "model_status": "loaded",
            "model_name": state.recognizer.name(),
            "stats_manager_status": "initialized",
            "serial_patterns": state.extractor.serial_table().patterns().len(),
            "caliber_patterns": state.extractor.caliber_table().patterns().len(),
            "app_version": env!("CARGO_PKG_VERSION"),
            "timestamp": timestamp(),
        })),
    )
}

/// Reconhece, extrai e contabiliza uma fabula. Roda fora do runtime async.
fn process_fabula(state: &AppState, text: &str) -> Result<DocumentAnalysis, RecognizeError> {
    let started = Instant::now();
    let doc = state.recognizer.recognize(text)?;
    let analysis = state.extractor.analyze(&doc);
    record_stats(state, &analysis, started.elapsed());
    Ok(analysis)
}

fn record_stats(state: &AppState, analysis: &DocumentAnalysis, elapsed: Duration) {
    if let Some(stats) = &state.stats {
        if let Err(e) = stats.record(analysis.entities.iter().map(|(_, label)| label), elapsed) {
            warn!("estatísticas não atualizadas: {}", e);
        }
    }
}

/// Análise de uma fabula
async fn analyze_handler(State(state): State<Arc<AppState>>, Json(req): Json<FabulaInput>) -> Response {
    if req.fabula.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    let chars = req.fabula.chars().count();
    let result = tokio::task::spawn_blocking(move || process_fabula(&state, &req.fabula)).await;
    match result {
        Ok(Ok(analysis)) => {
            info!(
                chars,
                entities = analysis.entities.len(),
                serial_numbers = analysis.serial_numbers.len(),
                calibers = analysis.calibers.len(),
                "fabula analisada"
            );
            Json(FabulaOutput::from(analysis)).into_response()
        }
        Ok(Err(e)) => {
            error!("falha ao processar fabula: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Falha ao processar o texto: {e}"))
        }
        Err(e) => {
            error!("tarefa de análise abortada: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Falha interna")
        }
    }
}

/// Análise em lote. Um item com falha é contado e não interrompe o lote.
async fn analyze_batch_handler(State(state): State<Arc<AppState>>, Json(req): Json<FabulaBatchInput>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let mut docs = Vec::with_capacity(req.fabulas.len());
        let mut failed_ctr = 0;
        for item in &req.fabulas {
            match state.recognizer.recognize(&item.fabula) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    failed_ctr += 1;
                    error!("falha ao processar item do lote: {}", e);
                }
            }
        }

        let analyses = state.extractor.analyze_batch(&docs);
        // tempo médio do lote por fabula
        let per_fabula = started.elapsed() / u32::try_from(analyses.len().max(1)).unwrap_or(u32::MAX);
        for analysis in &analyses {
            record_stats(&state, analysis, per_fabula);
        }

        FabulaBatchOutput {
            processed_ctr: analyses.len(),
            failed_ctr,
            results: analyses.into_iter().map(FabulaOutput::from).collect(),
        }
    })
    .await;

    match result {
        Ok(output) => {
            info!(processed = output.processed_ctr, failed = output.failed_ctr, "lote concluído");
            Json(output).into_response()
        }
        Err(e) => {
            error!("tarefa de lote abortada: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Falha interna")
        }
    }
}

/// Estatísticas de processamento (JSON)
async fn stat_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(stats) = &state.stats else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Sistema de estatísticas indisponível");
    };
    match stats.snapshot() {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!("falha ao ler estatísticas: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Falha ao ler estatísticas: {e}"))
        }
    }
}
