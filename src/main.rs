// Módulos de la aplicación
mod api;
mod app_state;
mod chat;
mod config;
mod error;
mod export;
mod extract;
mod fields;
mod gemini;
mod models;
mod news;
mod normalize;
mod report;
mod session;
mod unpack;

use axum::Router;
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::gemini::GeminiClient;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración (la clave puede faltar: el frontend lo avisa)
    let cfg = config::AppConfig::from_env();

    // 3. Inicializar el cliente de Gemini si hay credencial
    let gemini = cfg
        .gemini_api_key
        .clone()
        .map(|key| {
            GeminiClient::new(key, cfg.gemini_model.clone())
                .expect("Error inicializando el cliente de Gemini")
        });

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState::new(cfg.clone(), gemini, shutdown_tx);

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Workbench escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Fallo del servidor HTTP");

    info!("✅ Servidor cerrado correctamente.");
}
