use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::{
    chat::ChatSession, config::AppConfig, error::WorkbenchError, gemini::GeminiClient,
    session::WorkbenchSession,
};

/// Estado compartido de la aplicación. La sesión y el chat viven cada uno
/// tras su propio candado; toda mutación es reemplazo de valor completo y
/// ningún candado se mantiene a través de un `await`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gemini: Option<GeminiClient>,
    pub session: Arc<Mutex<WorkbenchSession>>,
    pub chat: Arc<Mutex<Option<ChatSession>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gemini: Option<GeminiClient>,
        shutdown_sender: oneshot::Sender<()>,
    ) -> Self {
        Self {
            config,
            gemini,
            session: Arc::new(Mutex::new(WorkbenchSession::new())),
            chat: Arc::new(Mutex::new(None)),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
        }
    }

    /// Cliente de Gemini o el error de configuración tipado.
    pub fn require_gemini(&self) -> Result<GeminiClient, WorkbenchError> {
        self.gemini.clone().ok_or(WorkbenchError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> AppConfig {
        AppConfig {
            gemini_api_key: api_key.map(|k| k.to_string()),
            gemini_model: "gemini-2.5-flash".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn sin_credencial_toda_operacion_de_modelo_se_rechaza() {
        let (tx, _rx) = oneshot::channel();
        let state = AppState::new(config(None), None, tx);
        let err = state.require_gemini().unwrap_err();
        assert!(matches!(err, WorkbenchError::MissingCredential));
    }

    #[test]
    fn con_credencial_el_cliente_esta_disponible() {
        let (tx, _rx) = oneshot::channel();
        let cfg = config(Some("clave"));
        let client = GeminiClient::new("clave".to_string(), cfg.gemini_model.clone()).unwrap();
        let state = AppState::new(cfg, Some(client), tx);
        assert!(state.require_gemini().is_ok());
    }
}
