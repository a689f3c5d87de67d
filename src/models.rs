//! Modelos de dominio: el registro consolidado de extracción, las noticias
//! con sus citas, los mensajes de chat y los ficheros en tránsito.
//!
//! Los doc-comments de los campos no son decorativos: `schemars` los vuelca
//! como `description` en el JSON Schema por sección, y son la pista de
//! extracción que recibe el modelo.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Secciones del registro extraído
// ---------------------------------------------------------------------

/// Resumen narrativo del riesgo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskSummary {
    /// A concise summary of the key risks, coverages, and insured entity from the document.
    pub risk_summary: Option<String>,
}

/// Datos generales del cliente asegurado (anagrafica).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Anagrafica {
    /// Entity's legal name.
    pub entity_name: Option<String>,
    /// Alternative or former names.
    pub alt_names: Option<String>,
    /// Role (e.g., Policyholder, Insured, Owner).
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    /// Business Activity / Industry Sector.
    pub industry: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Full address.
    pub address: Option<String>,
    /// Main risk location.
    pub top_location: Option<String>,
    /// VAT number.
    pub vat: Option<String>,
    /// Tax Code.
    pub tax_code: Option<String>,
    /// Website.
    pub website: Option<String>,
    /// Broker name.
    pub broker_name: Option<String>,
    /// Brokerage company.
    pub broker_company: Option<String>,
    /// Coverage start date (YYYY-MM-DD format).
    pub period_from: Option<String>,
    /// Coverage end date (YYYY-MM-DD format).
    pub period_to: Option<String>,
    /// Risk types (Property, Liability, Cyber, etc.).
    pub risk_types: Option<String>,
    /// Territorial scope.
    pub territorial_scope: Option<String>,
    /// Loss history for the last 5 years.
    pub loss_history_5y: Option<String>,
    /// Annual revenue amount.
    pub annual_revenue_amount: Option<f64>,
    /// Year of revenue.
    pub annual_revenue_year: Option<i64>,
    /// Payroll amount.
    pub payroll_amount: Option<f64>,
    /// Year of payroll.
    pub payroll_year: Option<i64>,
    /// Number of employees.
    pub headcount: Option<i64>,
    /// Data quality status (ok, partial, ambiguous).
    pub data_status: Option<String>,
}

/// Detalle de daños materiales (Property).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDetails {
    /// Entity's legal name.
    pub entity_name: Option<String>,
    /// Main risk location.
    pub top_location: Option<String>,
    /// Sum insured for Property Damage.
    pub tiv_pd_total_eur: Option<f64>,
    /// Sum insured for Business Interruption.
    pub tiv_bi_sum_ins_eur: Option<f64>,
    /// Gross rate requested.
    pub rate_per_mille: Option<f64>,
    /// Catastrophic risks inclusion.
    pub cat_included: Option<String>,
    /// Buildings value in EUR.
    pub buildings_eur: Option<f64>,
    /// Machinery value in EUR.
    pub machinery_eur: Option<f64>,
    /// Stock value in EUR.
    pub stock_eur: Option<f64>,
    /// Contribution margin in EUR.
    pub margin_contribution_eur: Option<f64>,
    /// Fire protection summary.
    pub fire_protection_summary: Option<String>,
    /// Natural hazard notes.
    pub nat_hazard_notes: Option<String>,
    /// BI indemnity period in months.
    pub bi_period_months: Option<i64>,
    /// BI details.
    pub bi_notes: Option<String>,
    /// A summary of any other relevant property details not captured in other fields.
    pub property_notes: Option<String>,
    /// Data quality status.
    pub data_status: Option<String>,
}

/// Detalle de responsabilidad civil general (RCT/RCO).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralLiabilityDetails {
    /// General Liability Limit.
    pub rct_limit_eur: Option<f64>,
    /// Annual aggregate limit.
    pub aggregate_limit_eur: Option<f64>,
    /// Form (Loss Occurrence/Claims Made) for GL.
    pub form_rct_rco: Option<String>,
    /// USA/Canada Coverage (Yes/No).
    pub usa_can_covered: Option<String>,
    /// GL Deductible.
    pub ded_rct: Option<f64>,
    /// Coverage extensions.
    pub extensions: Option<String>,
    /// Main exclusions.
    pub exclusions: Option<String>,
    /// Waivers of recourse.
    pub waivers: Option<String>,
    /// Retroactivity / Extended Reporting.
    pub retro_ultrattivita: Option<String>,
    /// A summary of any other relevant general liability details not captured in other fields.
    pub general_liability_notes: Option<String>,
    /// Data quality status.
    pub data_status: Option<String>,
}

/// Detalle de responsabilidad civil de producto (RCP).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductLiabilityDetails {
    /// Product Liability Limit.
    pub rcp_limit_eur: Option<f64>,
    /// Form (Claims Made) for PL.
    pub form_rcp: Option<String>,
    /// Product Recall Sublimit.
    pub recall_sublimit_eur: Option<f64>,
    /// Accidental Pollution Sublimit.
    pub pollution_acc_sublimit_eur: Option<f64>,
    /// Third-party interruption sublimit.
    pub interruption_third_party_sublimit_eur: Option<f64>,
    /// PL Deductible.
    pub ded_rcp: Option<f64>,
    /// A summary of any other relevant product liability details not captured in other fields.
    pub product_liability_notes: Option<String>,
    /// Data quality status.
    pub data_status: Option<String>,
}

/// Una fila de sublímite: tupla (tipo de riesgo, cobertura, tipo, importe).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Sublimit {
    /// Risk Type (GL/RCO/PL/Property).
    pub risk_type: Option<String>,
    /// Coverage Type.
    pub coverage: Option<String>,
    /// Sublimit Type (amount/percent).
    pub sublimit_type: Option<String>,
    /// Amount EUR/%.
    pub amount_eur_percent: Option<String>,
}

/// Atributos estructurados de un edificio asegurado.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildingDetail {
    /// Entity's legal name.
    pub entity_name: Option<String>,
    /// Building ID.
    pub building_id: Option<String>,
    /// Building Name.
    pub building_name: Option<String>,
    /// Building Address.
    pub address: Option<String>,
    /// Occupancy (production, warehouse, offices).
    pub occupancy: Option<String>,
    /// Floor Area in sqm.
    pub floor_area_sm: Option<f64>,
    /// Building Replacement Cost Value.
    pub building_rcv_eur: Option<f64>,
    /// Contents Replacement Cost Value.
    pub contents_rcv_eur: Option<f64>,
    /// Total Replacement Cost Value.
    pub total_rcv_eur: Option<f64>,
    /// Year Built.
    pub year_built: Option<i64>,
    /// % presence of manual fire alarm.
    pub manual_fire_alarm_percent: Option<f64>,
    /// % presence of automatic fire alarm.
    pub automatic_fire_alarm_percent: Option<f64>,
    /// % presence of sprinklers.
    pub sprinklers_percent: Option<f64>,
    /// Roof Material.
    pub roof_material: Option<String>,
    /// A summary of any other relevant building details not captured in other fields.
    pub building_notes: Option<String>,
}

// ---------------------------------------------------------------------
// Registro consolidado
// ---------------------------------------------------------------------

/// Resultado consolidado de una ejecución de extracción.
///
/// Cada sub-registro es anulable campo a campo; la ausencia significa «no
/// encontrado», nunca un centinela. Las secciones-lista son siempre arrays,
/// vacíos cuando la extracción no encuentra nada.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedRecord {
    pub risk_summary: RiskSummary,
    pub anagrafica: Anagrafica,
    pub property_details: PropertyDetails,
    pub general_liability_details: GeneralLiabilityDetails,
    pub product_liability_details: ProductLiabilityDetails,
    #[serde(deserialize_with = "array_or_empty")]
    pub sublimits: Vec<Sublimit>,
    #[serde(rename = "dettaglioEdifici", deserialize_with = "array_or_empty")]
    pub building_details: Vec<BuildingDetail>,
}

impl ExtractedRecord {
    /// Nombre de la entidad principal, si la extracción lo encontró.
    pub fn entity_name(&self) -> Option<&str> {
        self.anagrafica
            .entity_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------
// Sección etiquetada Presente/Ausente
// ---------------------------------------------------------------------

/// Valor «vacío» bien definido de cada sección: todos los campos a null,
/// listas vacías. Es lo que sustituye a una sección fallida o ausente.
pub trait EmptySection {
    fn empty() -> Self;
}

impl EmptySection for RiskSummary {
    fn empty() -> Self {
        Self::default()
    }
}

impl EmptySection for Anagrafica {
    fn empty() -> Self {
        Self::default()
    }
}

impl EmptySection for PropertyDetails {
    fn empty() -> Self {
        Self::default()
    }
}

impl EmptySection for GeneralLiabilityDetails {
    fn empty() -> Self {
        Self::default()
    }
}

impl EmptySection for ProductLiabilityDetails {
    fn empty() -> Self {
        Self::default()
    }
}

impl<T> EmptySection for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }
}

/// Resultado de una sección: o llegó del modelo, o se degrada a su vacío.
///
/// Sustituye al coalescing truthy/falsy: la ausencia es un estado explícito
/// y la materialización del vacío es una función por tipo, no un `||`.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Present(T),
    Absent,
}

impl<T: EmptySection> Section<T> {
    /// Devuelve el valor presente o el vacío bien definido de la sección.
    pub fn materialize(self) -> T {
        match self {
            Section::Present(value) => value,
            Section::Absent => T::empty(),
        }
    }
}

impl<T> Section<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Section::Absent)
    }
}

impl<T> From<Option<T>> for Section<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Section::Present(v),
            None => Section::Absent,
        }
    }
}

/// Deserializa un array tolerando basura: un valor no-array se normaliza a
/// lista vacía y los elementos malformados se descartan uno a uno.
pub(crate) fn array_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// ---------------------------------------------------------------------
// Noticias y chat
// ---------------------------------------------------------------------

/// Cita web que sustenta el resumen de noticias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: Option<String>,
    pub uri: String,
}

/// Resultado del enriquecimiento de noticias. `None` como conjunto cuando ni
/// el resumen ni las citas existen («nada encontrado» no es un error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResult {
    pub summary: Option<String>,
    pub citations: Vec<Citation>,
}

/// Quién emitió un mensaje de chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Model,
}

/// Entrada del log de conversación, append-only por sesión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

// ---------------------------------------------------------------------
// Ficheros en tránsito
// ---------------------------------------------------------------------

/// Fichero subido por el usuario, antes de codificar: bytes crudos, nombre
/// original y tipo declarado (si el navegador lo aportó).
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Forma de transporte de un fichero: base64 + MIME definitivo.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFile {
    pub data: String,
    pub mime_type: String,
}
