use crate::{
    app::{App, AppError, ConfigureRequest, MemoryHit, QueryResponse, Stats},
    config::RetrievalConfig,
    decision::IntentAnalysis,
    memories::Memory,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{signal, sync::RwLock};

#[derive(Clone)]
struct SharedState {
    app: Arc<RwLock<App>>,
}

async fn start_app(app: App, images_path: String) {
    let app = Arc::new(RwLock::new(app));

    let signal = shutdown_signal();
    let shared_state = Arc::new(SharedState { app: app.clone() });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    let app = Router::new()
        .nest_service(
            "/api/file/",
            tower_http::services::ServeDir::new(images_path),
        )
        .route("/api/query", post(query))
        .route("/api/search", post(search))
        .route("/api/memories", get(memories))
        .route("/api/memories/location", post(memories_by_location))
        .route("/api/stats", get(stats))
        .route("/api/analyze", post(analyze))
        .route("/api/config", get(get_config))
        .route("/api/config", post(update_config))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
    log::info!("listening on 0.0.0.0:8080");
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .unwrap();
}

pub fn start_daemon(app: App, images_path: String) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(app, images_path).await });
}

// Make our own error that wraps `AppError`.
#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response. Query-level
// conditions never reach here, so everything left is a server fault.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        log::error!("{self:?}");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": self.0.to_string()}).to_string(),
        )
            .into_response()
    }
}

// This enables using `?` on functions that return `Result<_, AppError>` to
// turn them into `Result<_, HttpError>`. That way you don't need to do that
// manually.
impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

async fn query(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<axum::Json<QueryResponse>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        app.respond_to_query(&payload.query)
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// How many candidates to return.
    ///
    /// *Defaults to the configured search depth*
    pub k: Option<usize>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<axum::Json<Vec<MemoryHit>>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let k = payload.k.unwrap_or_else(|| app.retrieval_config().search_k);

        app.search(&payload.query, k)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn memories(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<Vec<Memory>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        Ok(app.all_memories().into())
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationRequest {
    pub location: String,
}

async fn memories_by_location(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<LocationRequest>,
) -> Result<axum::Json<Vec<Memory>>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        Ok(app.memories_by_location(&payload.location).into())
    })
}

async fn stats(State(state): State<Arc<SharedState>>) -> Result<axum::Json<Stats>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        Ok(app.stats().into())
    })
}

async fn analyze(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<axum::Json<IntentAnalysis>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        Ok(app.analyze_query(&payload.query).into())
    })
}

async fn get_config(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<RetrievalConfig>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        Ok(app.retrieval_config().into())
    })
}

async fn update_config(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ConfigureRequest>,
) -> Result<axum::Json<RetrievalConfig>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let mut app = app.blocking_write();
        app.configure(payload).map(Into::into).map_err(Into::into)
    })
}
