//! Carga y gestión de configuración de la aplicación (Gemini + servidor).

use std::env;

use tracing::warn;

/// Configuración completa de la aplicación.
///
/// La clave de Gemini es deliberadamente un `Option`: el servidor debe poder
/// arrancar sin ella para que el frontend muestre el aviso de configuración,
/// mientras que cada operación que toca el modelo la exige por adelantado.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub server_addr: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Self {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if gemini_api_key.is_none() {
            warn!("Falta GEMINI_API_KEY en el entorno: la extracción, las noticias y el chat quedarán bloqueados.");
        }

        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        Self {
            gemini_api_key,
            gemini_model,
            server_addr,
        }
    }

    /// ¿Hay credencial disponible para llamar a la API?
    pub fn api_key_configured(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}
