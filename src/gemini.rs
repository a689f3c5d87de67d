//! Cliente fino sobre la API REST de Gemini (`generateContent`).
//!
//! Tres operaciones: extracción estructurada (ficheros inline + JSON Schema),
//! consulta con búsqueda web (grounding) y chat con historial reproducido.
//! El transporte es reqwest; la API se consume como caja negra
//! petición/respuesta.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{ChatMessage, EncodedFile, Sender};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT_SECS: u64 = 90;
const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Errores de la capa Gemini. El texto de la API se conserva tal cual para
/// que los llamantes clasifiquen por contenido (p. ej. `RESOURCE_EXHAUSTED`).
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("fallo de red llamando a Gemini: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("la API de Gemini devolvió HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no se pudo interpretar la respuesta de Gemini: {0}")]
    ResponseParsing(String),

    #[error("la respuesta de Gemini no contiene texto de candidato")]
    EmptyResponse,
}

impl GeminiError {
    /// ¿Es un error de cuota/límite de peticiones?
    pub fn is_rate_limited(&self) -> bool {
        let text = self.to_string();
        text.contains("RESOURCE_EXHAUSTED") || text.contains("429")
    }

    /// ¿Es un error de servicio sobrecargado/no disponible?
    pub fn is_overloaded(&self) -> bool {
        let text = self.to_string();
        text.contains("UNAVAILABLE") || text.contains("overloaded") || text.contains("503")
    }
}

// ---------------------------------------------------------------------
// Cuerpos de petición y respuesta
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn file(file: &EncodedFile) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<Value>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

// Struct con llaves vacías: serializa a `{}` (una unit struct daría `null`).
#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Metadatos de grounding de la búsqueda web.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    // FIX: la API a veces omite la lista o devuelve algo que no es un array;
    // se normaliza a lista vacía en vez de tumbar el parseo completo.
    #[serde(default, deserialize_with = "crate::models::array_or_empty")]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

/// Respuesta de una consulta con búsqueda: texto más fuentes citadas.
#[derive(Debug)]
pub struct GroundedReply {
    pub text: Option<String>,
    pub chunks: Vec<GroundingChunk>,
}

// ---------------------------------------------------------------------
// Cliente
// ---------------------------------------------------------------------

/// Cliente de la API de Gemini con credencial y modelo fijados al arranque.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Construye el cliente con el timeout de petición por defecto.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
        })
    }

    /// Extracción estructurada: todos los ficheros inline, una instrucción y
    /// salida restringida al JSON Schema de la sección. Devuelve el JSON ya
    /// parseado; decidir qué hacer con él (o con el fallo) es del llamante.
    pub async fn generate_structured(
        &self,
        instruction: &str,
        files: &[EncodedFile],
        schema: Value,
    ) -> Result<Value, GeminiError> {
        let mut parts = vec![Part::text(instruction)];
        parts.extend(files.iter().map(Part::file));

        let request = GenerateContentRequest {
            contents: vec![Content { role: None, parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_json_schema: Some(schema),
                temperature: EXTRACTION_TEMPERATURE,
            }),
            tools: None,
        };

        let response = self.generate(&request).await?;
        let text = first_candidate_text(&response).ok_or(GeminiError::EmptyResponse)?;

        // Limpiar la respuesta del LLM para asegurar que solo contenga el JSON.
        let json_text = text
            .trim()
            .trim_start_matches("```json")
            .trim_end_matches("```")
            .trim();

        serde_json::from_str(json_text)
            .map_err(|e| GeminiError::ResponseParsing(format!("{e} en: '{json_text}'")))
    }

    /// Consulta con la herramienta de búsqueda web habilitada.
    pub async fn generate_grounded(&self, query: &str) -> Result<GroundedReply, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(query)],
            }],
            system_instruction: None,
            generation_config: None,
            tools: Some(vec![Tool {
                google_search: GoogleSearch {},
            }]),
        };

        let mut response = self.generate(&request).await?;
        let text = first_candidate_text(&response);
        let chunks = if response.candidates.is_empty() {
            Vec::new()
        } else {
            response.candidates.remove(0).grounding_metadata.unwrap_or_default().grounding_chunks
        };

        Ok(GroundedReply { text, chunks })
    }

    /// Un turno de chat: la API REST no guarda estado, así que cada turno
    /// reproduce la instrucción de sistema y el historial completo.
    pub async fn chat_reply(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, GeminiError> {
        let contents = history
            .iter()
            .map(|message| Content {
                role: Some(
                    match message.sender {
                        Sender::User => "user",
                        Sender::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part::text(message.text.clone())],
            })
            .collect();

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(system_instruction)],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_json_schema: None,
                temperature,
            }),
            tools: None,
        };

        let response = self.generate(&request).await?;
        first_candidate_text(&response).ok_or(GeminiError::EmptyResponse)
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GeminiError::ResponseParsing(e.to_string()))
    }
}

/// Texto del primer candidato, concatenando sus partes.
fn first_candidate_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let parts = &candidate.content.as_ref()?.parts;
    let text: String = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
