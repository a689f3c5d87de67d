//! API JSON del workbench: ficheros, extracción, registro, chat y exports.
//!
//! Los handlers son finos: validan, mueven la máquina de estados y delegan.
//! La extracción corre en una tarea en segundo plano; el estado visible
//! siempre sale del candado de sesión, nunca de variables sueltas.

use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::AppState,
    chat::{ChatSession, SendRejection, GENERIC_ERROR_REPLY},
    export, extract,
    gemini::GeminiClient,
    models::{ExtractedRecord, UploadedFile},
    news, normalize,
    report::{self, PdfExportConfig},
    unpack,
};

/// Cuerpos grandes: los documentos viajan en base64 dentro del JSON.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct AddFilesPayload {
    files: Vec<FilePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    /// Bytes del fichero en base64 estándar.
    data: String,
}

#[derive(Deserialize)]
pub struct RemoveFilePayload {
    name: String,
}

#[derive(Deserialize)]
pub struct ChatPayload {
    message: String,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(config_handler))
        .route("/api/session", get(session_handler))
        .route("/api/files", post(add_files_handler))
        .route("/api/files/remove", post(remove_file_handler))
        .route("/api/files/clear", post(clear_files_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/record", put(update_record_handler))
        .route("/api/chat/reset", post(chat_reset_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/export/csv", post(export_csv_handler))
        .route("/api/export/pdf", post(export_pdf_handler))
        .route("/api/email-draft", post(email_draft_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}

// --- Configuración y estado ---

#[axum::debug_handler]
async fn config_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "apiKeyConfigured": state.config.api_key_configured(),
        "model": state.config.gemini_model,
    }))
}

#[axum::debug_handler]
async fn session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.session.lock().unwrap().view();
    Json(view)
}

// --- Gestión de ficheros ---

#[axum::debug_handler]
async fn add_files_handler(
    State(state): State<AppState>,
    Json(payload): Json<AddFilesPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut incoming = Vec::with_capacity(payload.files.len());
    for file in payload.files {
        let bytes = STANDARD.decode(file.data.as_bytes()).map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("El contenido de \"{}\" no es base64 válido.", file.name),
            )
        })?;
        incoming.push(UploadedFile {
            name: file.name,
            content_type: file.content_type.filter(|t| !t.is_empty()),
            bytes,
        });
    }

    let mut session = state.session.lock().unwrap();
    if session.is_extracting() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Hay una extracción en curso; espera a que termine.",
        ));
    }
    session.add_files(incoming);
    Ok(Json(session.view()))
}

#[axum::debug_handler]
async fn remove_file_handler(
    State(state): State<AppState>,
    Json(payload): Json<RemoveFilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.lock().unwrap();
    if session.is_extracting() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Hay una extracción en curso; espera a que termine.",
        ));
    }
    session.remove_file(&payload.name);
    Ok(Json(session.view()))
}

#[axum::debug_handler]
async fn clear_files_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.lock().unwrap();
    if session.is_extracting() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Hay una extracción en curso; espera a que termine.",
        ));
    }
    session.clear_files();
    Ok(Json(session.view()))
}

// --- Extracción ---

#[axum::debug_handler]
async fn extract_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state
        .require_gemini()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let staged = {
        let mut session = state.session.lock().unwrap();
        if session.is_extracting() {
            return Err(api_error(
                StatusCode::CONFLICT,
                "Ya hay una extracción en curso.",
            ));
        }
        let staged = session.staged_files().to_vec();
        if !session.begin_extraction() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "No hay ficheros preparados para extraer.",
            ));
        }
        staged
    };

    spawn(run_extraction(state, client, staged));
    Ok(StatusCode::ACCEPTED)
}

/// Pipeline en segundo plano: desempaquetar → normalizar/codificar →
/// extraer en paralelo → (si hay entidad) noticias. Cualquier salida de
/// esta función deja los flags de carga de la sesión en reposo.
async fn run_extraction(state: AppState, client: GeminiClient, staged: Vec<UploadedFile>) {
    let expanded = unpack::expand_files(staged);

    let encoded = match normalize::encode_files(&expanded) {
        Ok(encoded) => encoded,
        Err(err) => {
            error!("Extracción abortada: {err}");
            state.session.lock().unwrap().fail_extraction(err.to_string());
            return;
        }
    };

    info!("Lanzando extracción por secciones sobre {} fichero(s).", encoded.len());
    let record = extract::extract_record(&client, &encoded).await;

    let entity = state.session.lock().unwrap().complete_extraction(record);

    let Some(entity_name) = entity else {
        info!("Extracción completada sin nombre de entidad: no se buscan noticias.");
        return;
    };

    info!("Extracción completada; buscando noticias de '{entity_name}'.");
    match news::fetch_news(&client, &entity_name).await {
        Ok(result) => state.session.lock().unwrap().news_ready(result),
        Err(err) => {
            let message = news::classify_news_error(&err);
            error!("Fallo buscando noticias de '{entity_name}': {err}");
            state.session.lock().unwrap().news_failed(message.to_string());
        }
    }
}

// --- Registro editado ---

#[axum::debug_handler]
async fn update_record_handler(
    State(state): State<AppState>,
    Json(record): Json<ExtractedRecord>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.lock().unwrap();
    if !session.update_record(record) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "No hay registro extraído que editar.",
        ));
    }
    Ok(Json(session.view()))
}

// --- Chat ---

#[axum::debug_handler]
async fn chat_reset_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let (record_id, record) = {
        let session = state.session.lock().unwrap();
        match (session.record_id(), session.record()) {
            (Some(id), Some(record)) => (id, record.clone()),
            _ => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "No hay datos extraídos sobre los que conversar.",
                ))
            }
        }
    };

    let chat = ChatSession::new(record_id, &record);
    let messages = chat.messages().to_vec();
    *state.chat.lock().unwrap() = Some(chat);
    Ok(Json(json!({ "messages": messages })))
}

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state
        .require_gemini()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    // Abrir el intercambio bajo candado; la sesión se re-inicializa cuando
    // la identidad del registro cambió desde la última conversación.
    let (bound_id, system_instruction, history, temperature) = {
        let session = state.session.lock().unwrap();
        let (record_id, record) = match (session.record_id(), session.record()) {
            (Some(id), Some(record)) => (id, record.clone()),
            _ => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "No hay datos extraídos sobre los que conversar.",
                ))
            }
        };
        let mut chat = state.chat.lock().unwrap();
        let needs_init = chat
            .as_ref()
            .map(|c| c.record_id() != record_id)
            .unwrap_or(true);
        if needs_init {
            *chat = Some(ChatSession::new(record_id, &record));
        }
        let chat_session = chat.as_mut().unwrap();
        match chat_session.begin_exchange(&payload.message) {
            Ok(history) => (
                chat_session.record_id(),
                chat_session.system_instruction().to_string(),
                history,
                chat_session.temperature(),
            ),
            Err(SendRejection::Busy) => {
                return Err(api_error(
                    StatusCode::CONFLICT,
                    "A reply is already in progress.",
                ))
            }
            Err(SendRejection::EmptyMessage) => {
                return Err(api_error(StatusCode::BAD_REQUEST, "Mensaje vacío."))
            }
        }
    };

    let outcome = client
        .chat_reply(&system_instruction, &history, temperature)
        .await;

    let reply = {
        let mut chat = state.chat.lock().unwrap();
        match chat.as_mut() {
            Some(session) if session.record_id() == bound_id => {
                session.complete_exchange(outcome)
            }
            // La sesión fue sustituida mientras volaba la respuesta: no se
            // toca el log nuevo, pero el usuario recibe algo coherente.
            _ => outcome.unwrap_or_else(|_| GENERIC_ERROR_REPLY.to_string()),
        }
    };

    Ok(Json(json!({ "reply": reply })))
}

// --- Exports ---

#[axum::debug_handler]
async fn export_csv_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let record = require_record(&state)?;
    Ok(Json(json!({
        "filename": export::csv_filename(&record),
        "content": export::record_to_csv(&record),
    })))
}

#[axum::debug_handler]
async fn export_pdf_handler(
    State(state): State<AppState>,
    Json(config): Json<PdfExportConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let (record, news_data) = {
        let session = state.session.lock().unwrap();
        match session.record() {
            Some(record) => (record.clone(), session.news().cloned()),
            None => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "No hay registro extraído que exportar.",
                ))
            }
        }
    };

    let bytes = report::generate_pdf_report(&record, news_data.as_ref(), &config)
        .map_err(|e| {
            error!("Fallo generando el PDF: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "No se pudo generar el PDF.")
        })?;

    let filename = report::pdf_filename(&record);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

#[axum::debug_handler]
async fn email_draft_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let record = require_record(&state)?;
    Ok(Json(export::draft_missing_data_email(&record)))
}

fn require_record(state: &AppState) -> Result<ExtractedRecord, ApiError> {
    state
        .session
        .lock()
        .unwrap()
        .record()
        .cloned()
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "No hay registro extraído que exportar.",
            )
        })
}

// --- Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
