//! Errores de dominio del workbench.
//!
//! Cada error se captura en la frontera más pequeña capaz de degradar con
//! sentido (por sección, por fichero, por llamada de noticias, por turno de
//! chat); sólo los fallos sin resultado parcial válido llegan al controlador.

use thiserror::Error;

/// Errores que el controlador y la API exponen al usuario.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// La credencial no está configurada: bloquea extracción, noticias y chat.
    #[error("The Gemini API key is not configured. Please set up the GEMINI_API_KEY in your environment to use this application.")]
    MissingCredential,

    /// Ningún tipo declarado ni extensión conocida: fatal para esa ejecución.
    #[error("Unsupported file type. Could not determine MIME type for \"{filename}\".")]
    UnsupportedFile { filename: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_incluye_el_nombre() {
        let err = WorkbenchError::UnsupportedFile {
            filename: "informe.xyz".to_string(),
        };
        assert!(err.to_string().contains("informe.xyz"));
    }

    #[test]
    fn missing_credential_menciona_la_variable() {
        assert!(WorkbenchError::MissingCredential
            .to_string()
            .contains("GEMINI_API_KEY"));
    }
}
