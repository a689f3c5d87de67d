//! Resolución de tipo MIME y codificación de transporte de los ficheros.
//!
//! Precedencia: tipo declarado no genérico → tabla de extensiones →
//! genérico declarado. Sin tipo declarado ni extensión conocida, el fichero
//! es fatal para esa ejecución (con su nombre en el error).

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::WorkbenchError;
use crate::models::{EncodedFile, UploadedFile};

const GENERIC_MIME: &str = "application/octet-stream";

/// Extensión en minúsculas de un nombre de fichero, si la tiene.
pub(crate) fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Tabla explícita de los formatos que el workbench acepta de primera mano.
fn well_known_mime(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "eml" => Some("message/rfc822"),
        "msg" => Some("application/vnd.ms-outlook"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Resuelve el tipo MIME definitivo de un fichero ya desempaquetado.
pub fn resolve_mime(file: &UploadedFile) -> Result<String, WorkbenchError> {
    if let Some(declared) = file.content_type.as_deref() {
        if !declared.is_empty() && declared != GENERIC_MIME {
            return Ok(declared.to_string());
        }
    }

    if let Some(ext) = extension(&file.name) {
        if let Some(mime) = well_known_mime(&ext) {
            return Ok(mime.to_string());
        }
        if let Some(guessed) = mime_guess::from_ext(&ext).first() {
            return Ok(guessed.to_string());
        }
    }

    // Sólo queda el genérico declarado; sin él, el fichero no es procesable.
    match file.content_type.as_deref() {
        Some(declared) if !declared.is_empty() => Ok(declared.to_string()),
        _ => Err(WorkbenchError::UnsupportedFile {
            filename: file.name.clone(),
        }),
    }
}

/// Codifica cada fichero a su forma de transporte (base64 + MIME resuelto).
/// El primer fichero sin tipo resoluble aborta la ejecución completa.
pub fn encode_files(files: &[UploadedFile]) -> Result<Vec<EncodedFile>, WorkbenchError> {
    files
        .iter()
        .map(|file| {
            let mime_type = resolve_mime(file)?;
            Ok(EncodedFile {
                data: STANDARD.encode(&file.bytes),
                mime_type,
            })
        })
        .collect()
}
