//! Máquina de estados de la sesión de trabajo.
//!
//! Secuencia: ficheros preparados → extrayendo → extraído, con el sub-estado
//! ortogonal de noticias (inactivo → cargando → listo/fallido) y el terminal
//! re-entrable de extracción fallida. Toda mutación es reemplazo de valor
//! completo bajo un único candado; las transiciones son puras y se prueban
//! sin E/S.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{ExtractedRecord, NewsResult, UploadedFile};

/// Fase principal de la sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FilesStaged,
    Extracting,
    Extracted,
    ExtractionFailed,
}

/// Sub-estado ortogonal de noticias: nunca revierte la fase principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsPhase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Estado completo de la sesión de un usuario.
#[derive(Debug, Clone)]
pub struct WorkbenchSession {
    files: Vec<UploadedFile>,
    phase: Phase,
    record: Option<ExtractedRecord>,
    record_id: Option<Uuid>,
    news_phase: NewsPhase,
    news: Option<NewsResult>,
    error: Option<String>,
    news_error: Option<String>,
}

impl Default for WorkbenchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbenchSession {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            phase: Phase::Idle,
            record: None,
            record_id: None,
            news_phase: NewsPhase::Idle,
            news: None,
            error: None,
            news_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn news_phase(&self) -> NewsPhase {
        self.news_phase
    }

    pub fn is_extracting(&self) -> bool {
        self.phase == Phase::Extracting
    }

    pub fn record(&self) -> Option<&ExtractedRecord> {
        self.record.as_ref()
    }

    pub fn record_id(&self) -> Option<Uuid> {
        self.record_id
    }

    pub fn news(&self) -> Option<&NewsResult> {
        self.news.as_ref()
    }

    pub fn staged_files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Añade ficheros deduplicando por nombre. Un duplicado es no-op sobre la
    /// lista; cualquier nombre realmente nuevo invalida los resultados
    /// previos (un conjunto de ficheros fresco anula el registro anterior).
    /// Devuelve cuántos ficheros entraron de verdad.
    pub fn add_files(&mut self, incoming: Vec<UploadedFile>) -> usize {
        if self.is_extracting() {
            return 0;
        }
        let mut added = 0;
        for file in incoming {
            if self.files.iter().any(|f| f.name == file.name) {
                continue;
            }
            self.files.push(file);
            added += 1;
        }
        if added > 0 {
            self.invalidate_results();
        }
        added
    }

    /// Retira un fichero por nombre; si existía, invalida resultados previos.
    pub fn remove_file(&mut self, name: &str) -> bool {
        if self.is_extracting() {
            return false;
        }
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        let removed = self.files.len() != before;
        if removed {
            self.invalidate_results();
        }
        removed
    }

    /// Vacía la lista de ficheros e invalida resultados previos.
    pub fn clear_files(&mut self) {
        if self.is_extracting() {
            return;
        }
        self.files.clear();
        self.invalidate_results();
    }

    /// Entra en `Extracting` limpiando cualquier resultado anterior.
    /// Con cero ficheros, o ya en marcha, es un no-op y devuelve `false`.
    pub fn begin_extraction(&mut self) -> bool {
        if self.files.is_empty() || self.is_extracting() {
            return false;
        }
        self.invalidate_results();
        self.phase = Phase::Extracting;
        true
    }

    /// Extracción completada: fija el registro y, si hay nombre de entidad,
    /// arranca el sub-estado de noticias. Devuelve el nombre a buscar.
    pub fn complete_extraction(&mut self, record: ExtractedRecord) -> Option<String> {
        let entity = record.entity_name().map(|n| n.to_string());
        self.record = Some(record);
        self.record_id = Some(Uuid::new_v4());
        self.phase = Phase::Extracted;
        self.error = None;
        if entity.is_some() {
            self.news_phase = NewsPhase::Loading;
        } else {
            self.news_phase = NewsPhase::Idle;
        }
        entity
    }

    /// Extracción fallida: estado terminal re-entrable, sin arrancar noticias.
    pub fn fail_extraction(&mut self, reason: String) {
        self.phase = Phase::ExtractionFailed;
        self.error = Some(reason);
        self.record = None;
        self.record_id = None;
        self.news = None;
        self.news_phase = NewsPhase::Idle;
        self.news_error = None;
    }

    /// Resolución de noticias: sólo toca el sub-estado, nunca el registro.
    /// `None` es el estado válido «nada encontrado».
    pub fn news_ready(&mut self, news: Option<NewsResult>) {
        self.news = news;
        self.news_phase = NewsPhase::Ready;
        self.news_error = None;
    }

    pub fn news_failed(&mut self, message: String) {
        self.news = None;
        self.news_phase = NewsPhase::Failed;
        self.news_error = Some(message);
    }

    /// Edición en `Extracted`: reemplazo del valor completo del registro,
    /// misma identidad, sin tocar las noticias.
    pub fn update_record(&mut self, record: ExtractedRecord) -> bool {
        if self.phase != Phase::Extracted {
            return false;
        }
        self.record = Some(record);
        true
    }

    /// Vista serializable para el frontend.
    pub fn view(&self) -> SessionView {
        SessionView {
            files: self.files.iter().map(|f| f.name.clone()).collect(),
            phase: self.phase,
            news_phase: self.news_phase,
            record: self.record.clone(),
            record_id: self.record_id,
            news: self.news.clone(),
            error: self.error.clone(),
            news_error: self.news_error.clone(),
        }
    }

    fn invalidate_results(&mut self) {
        self.record = None;
        self.record_id = None;
        self.news = None;
        self.news_phase = NewsPhase::Idle;
        self.error = None;
        self.news_error = None;
        self.phase = if self.files.is_empty() {
            Phase::Idle
        } else {
            Phase::FilesStaged
        };
    }
}

/// Instantánea de la sesión que consume el frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub files: Vec<String>,
    pub phase: Phase,
    pub news_phase: NewsPhase,
    pub record: Option<ExtractedRecord>,
    pub record_id: Option<Uuid>,
    pub news: Option<NewsResult>,
    pub error: Option<String>,
    pub news_error: Option<String>,
}
