use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use docqa_rag::{
    CompletionClient, EmbeddingClient, PdfLoader, Query, RagPipeline, Stage,
    openai::{OpenAIChatProvider, OpenAIEmbeddingProvider},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::{Args, ServerConfig},
    error::ApiError,
    storage::FileStorage,
};

/// Default request body limit for uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub storage: Arc<FileStorage>,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pipeline: RagPipeline, storage: FileStorage) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            storage: Arc::new(storage),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }
}

/// Build the production state: OpenAI providers and a PDF loader over the upload directory.
pub async fn build_state(args: &Args) -> anyhow::Result<AppState> {
    let storage = FileStorage::new(&args.upload_dir, args.upload_policy);
    storage
        .ensure_root()
        .await
        .with_context(|| format!("cannot create upload dir {}", args.upload_dir.display()))?;

    let rag_config = args.rag_config()?;
    let provider = args.provider_config();
    let embedder = EmbeddingClient::new(
        Arc::new(OpenAIEmbeddingProvider::new(&provider)?),
        provider.clone(),
    )?;
    let completer =
        CompletionClient::new(Arc::new(OpenAIChatProvider::new(&provider)?), provider)?;

    let pipeline = RagPipeline::builder()
        .loader(Arc::new(PdfLoader::new(&args.upload_dir, rag_config.split_pages)))
        .config(rag_config)
        .embedding_client(embedder)
        .completion_client(completer)
        .build()?;

    Ok(AppState::new(pipeline, storage).with_max_upload_bytes(args.max_upload_bytes))
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../static/index.html"))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa"}))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub mimetype: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: bool,
    pub message: String,
    pub data: UploadedFile,
}

/// POST /upload
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "upload is not a multipart form");
        ApiError::bad_request("No file uploaded")
    })?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            return Err(ApiError::bad_request("No file uploaded"));
        };
        let mimetype = field
            .content_type()
            .and_then(|value| value.split(';').next())
            .map_or("application/octet-stream", str::trim)
            .to_string();
        if mimetype != PDF_MIME {
            warn!(name = %name, mimetype = %mimetype, "rejected non-pdf upload");
            return Err(ApiError::rejected(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "currently only pdf files are supported",
            ));
        }

        let bytes = field.bytes().await?;
        let stored = state.storage.save(&name, &bytes).await?;
        return Ok(Json(UploadResponse {
            status: true,
            message: "File is uploaded".to_string(),
            data: UploadedFile { name: stored.name, mimetype, size: stored.size },
        }));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default, rename = "fileName")]
    pub file_name: String,
}

/// POST /chat
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<String>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "malformed chat request");
        ApiError::validation_at(Stage::Idle, e.body_text())
    })?;

    if request.input.trim().is_empty() || request.file_name.trim().is_empty() {
        return Err(ApiError::validation_at(Stage::Idle, "File is not uploaded!!!"));
    }

    let query = Query::new(request.input, request.file_name);
    let answer = state.pipeline.answer(&query).await?;
    Ok(Json(answer.text))
}
