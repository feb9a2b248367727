use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use walog_core::store;
use walog_core::{Anomaly, ChatMessage, Chatroom};
use walog_shared::{ids, Contact, Media, MediaKind, Message, NewMessage};
use walog_store::{Database, StoreError};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::storage::MediaStorage;
use crate::thumbnail;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub storage: Arc<MediaStorage>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, storage: MediaStorage, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            storage: Arc::new(storage),
            config: Arc::new(config),
        }
    }

    /// Run `f` against the database. The lock is released before returning,
    /// so handlers never hold it across an await point.
    fn with_db<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError>,
    {
        let mut db = self
            .db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Lock poisoned: {e}")))?;
        Ok(f(&mut db)?)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let static_dir = state.storage.static_dir().map(FsPath::to_path_buf);
    let body_limit = state.config.max_upload_size;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/contacts", get(list_contacts))
        .route("/api/chats", get(list_chats))
        .route("/api/chats/:remote", get(chat_history))
        .route("/api/chatrooms", get(list_chatrooms))
        .route("/api/send", post(send_message))
        .route("/api/send-file", post(send_file))
        .route("/download/:stored_name", get(download))
        .route("/thumbnail/:stored_name", get(thumbnail_image));

    if let Some(dir) = static_dir {
        router = router.nest_service("/uploads", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Body of a successful create.
#[derive(Serialize)]
struct Created<T> {
    success: bool,
    message: &'static str,
    data: T,
}

fn created<T: Serialize>(message: &'static str, data: T) -> (StatusCode, Json<Created<T>>) {
    (
        StatusCode::CREATED,
        Json(Created {
            success: true,
            message,
            data,
        }),
    )
}

fn report_anomalies(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        return;
    }
    warn!(count = anomalies.len(), "Inconsistent records left out or rendered partially");
    for anomaly in anomalies {
        debug!(?anomaly, "Record anomaly");
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>, ServerError> {
    let contacts = state.with_db(|db| db.list_contacts())?;
    Ok(Json(contacts))
}

async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<Message>>, ServerError> {
    let messages = state.with_db(|db| db.list_messages())?;
    Ok(Json(messages))
}

async fn chat_history(
    State(state): State<AppState>,
    Path(remote): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    let (history, anomalies) = state.with_db(|db| store::conversation_history(&*db, &remote))?;
    report_anomalies(&anomalies);
    debug!(chat = %remote, count = history.len(), "Served conversation history");
    Ok(Json(history))
}

async fn list_chatrooms(State(state): State<AppState>) -> Result<Json<Vec<Chatroom>>, ServerError> {
    let aggregation = state.with_db(|db| store::load_chatrooms(&*db))?;
    report_anomalies(&aggregation.anomalies);
    Ok(Json(aggregation.chatrooms))
}

async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let message = Message::try_from(request)?;
    let stored = state.with_db(|db| db.insert_message(message))?;

    info!(
        id = %stored.local_id.serialized,
        chat = ?stored.conversation_id(),
        has_media = stored.has_media,
        "Message sent"
    );
    Ok(created("Message sent successfully", stored))
}

/// One `files` part of an upload.
struct UploadPart {
    filename: String,
    mimetype: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    chatroom_id: Option<String>,
    timestamp: Option<i64>,
    total: Option<u32>,
    files: Vec<UploadPart>,
}

async fn read_upload_form(mut multipart: Multipart, max: usize) -> Result<UploadForm, ServerError> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::TooLarge { max }
        } else {
            ServerError::BadRequest(format!("Multipart error: {}", e.body_text()))
        }
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or("file").to_string();
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                form.files.push(UploadPart {
                    filename,
                    mimetype,
                    data,
                });
            }
            "chatroomID" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.chatroom_id = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            "timestamp" => {
                let value = field.text().await.map_err(multipart_error)?;
                let parsed = value.trim().parse().map_err(|_| {
                    ServerError::BadRequest(format!("Invalid timestamp '{value}'"))
                })?;
                form.timestamp = Some(parsed);
            }
            "total" => {
                let value = field.text().await.map_err(multipart_error)?;
                let parsed = value
                    .trim()
                    .parse()
                    .map_err(|_| ServerError::BadRequest(format!("Invalid total '{value}'")))?;
                form.total = Some(parsed);
            }
            other => debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }
    Ok(form)
}

async fn send_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let form = read_upload_form(multipart, state.config.max_upload_size).await?;

    if form.files.is_empty() {
        return Err(ServerError::BadRequest("No files provided".to_string()));
    }
    let chatroom_id = form
        .chatroom_id
        .ok_or_else(|| ServerError::BadRequest("Missing chatroomID".to_string()))?;
    let timestamp = form
        .timestamp
        .ok_or_else(|| ServerError::BadRequest("Missing timestamp".to_string()))?;
    let index_total = form
        .total
        .unwrap_or_else(|| form.files.len().saturating_sub(1) as u32);
    let media_key = ids::media_key(&chatroom_id, timestamp);

    let now_ms = chrono::Utc::now().timestamp_millis();
    let mut uploaded = Vec::with_capacity(form.files.len());
    // Files already written are listed in `uploaded` and discarded when a
    // later file or the metadata insert fails.
    let outcome: Result<(), ServerError> = async {
        for (index, part) in form.files.iter().enumerate() {
            let file = state
                .storage
                .put(now_ms + index as i64, &part.filename, &part.data)
                .await?;
            uploaded.push(Media {
                filename: ids::original_name(&file.stored_name).to_string(),
                stored_name: file.stored_name,
                path: file.path,
                mimetype: part.mimetype.clone(),
                size: part.data.len() as u64,
                uploaded_at: timestamp,
                chatroom_id: chatroom_id.clone(),
                media_key: media_key.clone(),
                file_index: index as u32,
                index_total,
            });
        }
        state.with_db(|db| db.insert_media_many(&uploaded))
    }
    .await;
    if let Err(e) = outcome {
        for media in &uploaded {
            state.storage.remove(&media.stored_name).await;
        }
        warn!(chat = %chatroom_id, discarded = uploaded.len(), error = %e, "Upload rejected");
        return Err(e);
    }

    info!(
        chat = %chatroom_id,
        media_key = %media_key,
        count = uploaded.len(),
        backend = %state.storage.backend(),
        "Files uploaded"
    );
    Ok(created("Files uploaded and metadata stored successfully", uploaded))
}

fn find_media(state: &AppState, stored_name: &str) -> Result<Media, ServerError> {
    state
        .with_db(|db| db.get_media_by_stored_name(stored_name))?
        .ok_or_else(|| ServerError::NotFound(format!("File {stored_name}")))
}

fn content_type(mimetype: &str) -> HeaderValue {
    HeaderValue::from_str(mimetype)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

async fn download(
    State(state): State<AppState>,
    Path(stored_name): Path<String>,
) -> Result<Response, ServerError> {
    let media = find_media(&state, &stored_name)?;
    let data = state.storage.fetch(&media).await?;

    let filename = ids::original_name(&media.stored_name).replace('"', "");
    let disposition = HeaderValue::from_bytes(format!("attachment; filename=\"{filename}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    debug!(name = %stored_name, size = data.len(), "Serving download");
    Ok((
        [
            (CONTENT_TYPE, content_type(&media.mimetype)),
            (CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

async fn thumbnail_image(
    State(state): State<AppState>,
    Path(stored_name): Path<String>,
) -> Result<Response, ServerError> {
    let media = find_media(&state, &stored_name)?;
    if media.kind() != MediaKind::Image {
        return Err(ServerError::Unsupported(format!(
            "no thumbnail for {}",
            media.mimetype
        )));
    }

    let data = state.storage.fetch(&media).await?;
    let png = thumbnail::render(data, &media.mimetype).await?;
    Ok(([(CONTENT_TYPE, HeaderValue::from_static("image/png"))], png).into_response())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
