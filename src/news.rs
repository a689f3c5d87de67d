//! Enriquecimiento de noticias: una consulta con búsqueda web sobre el
//! nombre de la entidad extraída, con resumen narrativo y citas depuradas.
//!
//! «Nada encontrado» es un estado terminal válido (`Ok(None)`), no un error.
//! Los errores de transporte/modelo sí se propagan: clasificarlos (límite de
//! cuota frente a fallo genérico) es responsabilidad del llamante.

use std::collections::HashSet;

use url::Url;

use crate::gemini::{GeminiClient, GeminiError, GroundedReply};
use crate::models::{Citation, NewsResult};

/// Mensaje específico cuando la API señala límite de cuota.
pub const RATE_LIMIT_MESSAGE: &str =
    "Could not fetch news due to API rate limits. Please check your plan and billing details.";

/// Mensaje genérico para cualquier otro fallo de noticias.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to fetch news and web information.";

/// Busca información pública reciente sobre la entidad. Con nombre vacío no
/// se emite petición alguna y el resultado es `None` de inmediato.
pub async fn fetch_news(
    client: &GeminiClient,
    entity_name: &str,
) -> Result<Option<NewsResult>, GeminiError> {
    let name = entity_name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    let query =
        format!("Summarize the latest news and relevant web information about \"{name}\".");
    let reply = client.generate_grounded(&query).await?;
    Ok(news_from_reply(reply))
}

/// Clasifica un fallo de noticias en su mensaje de cara al usuario.
pub fn classify_news_error(err: &GeminiError) -> &'static str {
    if err.is_rate_limited() {
        RATE_LIMIT_MESSAGE
    } else {
        GENERIC_FAILURE_MESSAGE
    }
}

/// Ensambla el resultado: resumen no vacío + citas con URI válida,
/// deduplicadas por URI conservando el orden de aparición.
fn news_from_reply(reply: GroundedReply) -> Option<NewsResult> {
    let summary = reply
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    for chunk in reply.chunks {
        let Some(web) = chunk.web else { continue };
        let Some(uri) = web.uri.filter(|u| Url::parse(u).is_ok()) else {
            continue;
        };
        if seen.insert(uri.clone()) {
            citations.push(Citation {
                title: web.title,
                uri,
            });
        }
    }

    if summary.is_none() && citations.is_empty() {
        None
    } else {
        Some(NewsResult { summary, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GroundingChunk, WebSource};

    fn chunk(uri: Option<&str>, title: Option<&str>) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebSource {
                uri: uri.map(|s| s.to_string()),
                title: title.map(|s| s.to_string()),
            }),
        }
    }

    #[test]
    fn nombre_vacio_no_emite_peticion() {
        let client = GeminiClient::new("clave".to_string(), "modelo".to_string()).unwrap();
        // Resuelve sin red: con petición real fallaría contra una clave falsa.
        let result = tokio_test::block_on(fetch_news(&client, ""));
        assert!(matches!(result, Ok(None)));
        let result = tokio_test::block_on(fetch_news(&client, "   "));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn respuesta_vacia_es_none_sin_error() {
        let reply = GroundedReply {
            text: None,
            chunks: Vec::new(),
        };
        assert!(news_from_reply(reply).is_none());

        let reply = GroundedReply {
            text: Some("   ".to_string()),
            chunks: vec![GroundingChunk { web: None }],
        };
        assert!(news_from_reply(reply).is_none());
    }

    #[test]
    fn las_citas_se_deduplican_por_uri() {
        let reply = GroundedReply {
            text: Some("Resumen de Acme".to_string()),
            chunks: vec![
                chunk(Some("https://example.com/a"), Some("Primera")),
                chunk(Some("https://example.com/a"), Some("Duplicada")),
                chunk(Some("https://example.com/b"), None),
            ],
        };
        let news = news_from_reply(reply).unwrap();
        assert_eq!(news.citations.len(), 2);
        assert_eq!(news.citations[0].uri, "https://example.com/a");
        assert_eq!(news.citations[0].title.as_deref(), Some("Primera"));
        assert_eq!(news.citations[1].uri, "https://example.com/b");
        assert!(news.citations[1].title.is_none());
    }

    #[test]
    fn uris_invalidas_quedan_fuera() {
        let reply = GroundedReply {
            text: None,
            chunks: vec![
                chunk(Some("esto no es una url"), Some("Rota")),
                chunk(None, Some("Sin URI")),
                chunk(Some("https://example.com/ok"), None),
            ],
        };
        let news = news_from_reply(reply).unwrap();
        assert_eq!(news.citations.len(), 1);
        assert_eq!(news.citations[0].uri, "https://example.com/ok");
    }

    #[test]
    fn solo_citas_sin_resumen_sigue_siendo_resultado() {
        let reply = GroundedReply {
            text: None,
            chunks: vec![chunk(Some("https://example.com/a"), None)],
        };
        let news = news_from_reply(reply).unwrap();
        assert!(news.summary.is_none());
        assert_eq!(news.citations.len(), 1);
    }

    #[test]
    fn clasificacion_de_errores_de_noticias() {
        let rate = GeminiError::Api {
            status: 429,
            body: "RESOURCE_EXHAUSTED".to_string(),
        };
        assert_eq!(classify_news_error(&rate), RATE_LIMIT_MESSAGE);

        let other = GeminiError::ResponseParsing("EOF".to_string());
        assert_eq!(classify_news_error(&other), GENERIC_FAILURE_MESSAGE);
    }
}
