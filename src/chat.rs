//! Sesión conversacional anclada a una instantánea inmutable del registro.
//!
//! Cada respuesta debe poder derivarse sólo de esa instantánea: la
//! instrucción de sistema incrusta el JSON completo del registro y prohíbe
//! conocimiento externo. Un intercambio en vuelo bloquea los siguientes; un
//! fallo de turno se convierte en una respuesta guionizada del asistente,
//! nunca en un log inconsistente.

use serde_json::json;
use uuid::Uuid;

use crate::gemini::GeminiError;
use crate::models::{ChatMessage, ExtractedRecord, Sender};

/// Saludo con el que abre toda sesión nueva.
pub const GREETING: &str =
    "Hello! I am RiskBot, your AI assistant. Ask me anything about the extracted data from the document.";

/// Respuesta guionizada cuando el servicio está sobrecargado.
pub const OVERLOADED_REPLY: &str =
    "The AI assistant is currently overloaded. Please wait a moment before sending your message again.";

/// Disculpa genérica para cualquier otro fallo de turno.
pub const GENERIC_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

const CHAT_TEMPERATURE: f32 = 0.3;

/// Rechazos posibles al abrir un intercambio.
#[derive(Debug, PartialEq, Eq)]
pub enum SendRejection {
    /// Ya hay un intercambio en vuelo: como máximo uno por sesión.
    Busy,
    /// Mensaje vacío.
    EmptyMessage,
}

/// Sesión de chat ligada a un registro concreto por identidad.
#[derive(Debug, Clone)]
pub struct ChatSession {
    record_id: Uuid,
    system_instruction: String,
    messages: Vec<ChatMessage>,
    in_flight: bool,
}

impl ChatSession {
    /// Crea la sesión incrustando la instantánea serializada del registro.
    /// Las ediciones posteriores del registro no alteran esta sesión: hay
    /// que inicializar una nueva para que el chat vea los cambios.
    pub fn new(record_id: Uuid, record: &ExtractedRecord) -> Self {
        let data = serde_json::to_string_pretty(record)
            .unwrap_or_else(|_| json!({}).to_string());
        let system_instruction = format!(
            "You are a helpful AI assistant for an insurance underwriter. Your name is \"RiskBot\".\n\
             Your purpose is to answer questions based *exclusively* on the following JSON data which represents extracted information from an insurance document.\n\
             Do not use any external knowledge or make assumptions beyond what is provided in this data.\n\
             If a question cannot be answered from the data, state that clearly. Keep your answers concise and professional.\n\
             Format your answers for readability, using bullet points or bold text where helpful.\n\n\
             Here is the risk data:\n{data}\n"
        );

        Self {
            record_id,
            system_instruction,
            messages: vec![ChatMessage {
                sender: Sender::Model,
                text: GREETING.to_string(),
            }],
            in_flight: false,
        }
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn temperature(&self) -> f32 {
        CHAT_TEMPERATURE
    }

    /// Abre un intercambio: apunta el mensaje del usuario y marca la sesión
    /// en vuelo. Devuelve el historial a reproducir ante el modelo.
    pub fn begin_exchange(&mut self, text: &str) -> Result<Vec<ChatMessage>, SendRejection> {
        if self.in_flight {
            return Err(SendRejection::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::EmptyMessage);
        }
        self.messages.push(ChatMessage {
            sender: Sender::User,
            text: text.to_string(),
        });
        self.in_flight = true;
        Ok(self.messages.clone())
    }

    /// Cierra el intercambio apuntando la respuesta del modelo. Un error se
    /// degrada a respuesta guionizada (sobrecarga o disculpa genérica), de
    /// modo que esta operación nunca falla hacia fuera.
    pub fn complete_exchange(&mut self, outcome: Result<String, GeminiError>) -> String {
        let reply = match outcome {
            Ok(text) => text,
            Err(err) if err.is_overloaded() => {
                tracing::warn!("El chat respondió sobrecargado: {err}");
                OVERLOADED_REPLY.to_string()
            }
            Err(err) => {
                tracing::error!("Fallo en el turno de chat: {err}");
                GENERIC_ERROR_REPLY.to_string()
            }
        };
        self.messages.push(ChatMessage {
            sender: Sender::Model,
            text: reply.clone(),
        });
        self.in_flight = false;
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Anagrafica;

    fn session() -> ChatSession {
        let record = ExtractedRecord {
            anagrafica: Anagrafica {
                entity_name: Some("Acme Corp".to_string()),
                ..Anagrafica::default()
            },
            ..ExtractedRecord::default()
        };
        ChatSession::new(Uuid::new_v4(), &record)
    }

    #[test]
    fn abre_con_el_saludo_guionizado() {
        let session = session();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender, Sender::Model);
        assert_eq!(session.messages()[0].text, GREETING);
    }

    #[test]
    fn la_instruccion_incrusta_la_instantanea() {
        let session = session();
        assert!(session.system_instruction().contains("RiskBot"));
        assert!(session.system_instruction().contains("Acme Corp"));
        assert!(session.system_instruction().contains("*exclusively*"));
    }

    #[test]
    fn un_intercambio_en_vuelo_rechaza_el_siguiente() {
        let mut session = session();
        let history = session.begin_exchange("¿Cuál es el límite RCT?").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            session.begin_exchange("otra pregunta"),
            Err(SendRejection::Busy)
        );

        session.complete_exchange(Ok("El límite es 5M EUR.".to_string()));
        assert!(session.begin_exchange("ahora sí").is_ok());
    }

    #[test]
    fn el_mensaje_vacio_se_rechaza() {
        let mut session = session();
        assert_eq!(session.begin_exchange("   "), Err(SendRejection::EmptyMessage));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn el_error_sobrecargado_se_convierte_en_respuesta_guionizada() {
        let mut session = session();
        session.begin_exchange("pregunta").unwrap();
        let reply = session.complete_exchange(Err(GeminiError::Api {
            status: 503,
            body: "The model is overloaded".to_string(),
        }));
        assert_eq!(reply, OVERLOADED_REPLY);

        // El log queda consistente: usuario y modelo alternados.
        let senders: Vec<Sender> = session.messages().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::Model, Sender::User, Sender::Model]);
    }

    #[test]
    fn otros_errores_dan_la_disculpa_generica() {
        let mut session = session();
        session.begin_exchange("pregunta").unwrap();
        let reply =
            session.complete_exchange(Err(GeminiError::ResponseParsing("EOF".to_string())));
        assert_eq!(reply, GENERIC_ERROR_REPLY);
        assert!(session.begin_exchange("siguiente").is_ok());
    }
}
