//! Orquestador de extracción: una petición independiente por sección del
//! esquema, lanzadas en paralelo y reunidas en un único registro.
//!
//! Una sección fallida (red, JSON malformado, esquema violado) se degrada a
//! su valor vacío sin tocar a sus hermanas; la latencia total la marca la
//! sección más lenta, no la suma. No hay reintentos: una sección que falla,
//! falla de forma permanente para esa ejecución.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::gemini::{GeminiClient, GeminiError};
use crate::models::{
    Anagrafica, BuildingDetail, EncodedFile, ExtractedRecord, GeneralLiabilityDetails,
    ProductLiabilityDetails, PropertyDetails, RiskSummary, Section, Sublimit,
};

/// Instrucción compartida por las siete secciones: extraer sólo lo presente,
/// no inventar, null/array vacío para lo ausente, salida ceñida al esquema.
const BASE_INSTRUCTION: &str = "You are an expert AI assistant for an insurance underwriting workbench. \
Your task is to meticulously extract and consolidate all relevant information from the provided documents. \
The documents could be a mix of PDFs, Word documents, or emails related to the same insurance policy or client. \
If information for the same field is present in multiple documents, prioritize the most recent or comprehensive data. \
If a specific piece of information is not found, you MUST use 'null' as the value for that field. Do not invent information. \
For fields that are arrays (like 'dettaglioEdifici' or 'sublimits'), return an empty array [] if no items are found. \
Return only the JSON object based on the provided schema.\n\n\
Now, focus ONLY on extracting the data for the following section:";

const RISK_SUMMARY_FOCUS: &str = "Risk Summary. This should be a concise overview highlighting the main insured party, primary risks, and significant limits.";
const ANAGRAFICA_FOCUS: &str = "General Information (Anagrafica). IMPORTANT: This section MUST exclusively contain information about the insured client. Do NOT populate it with details about the insurer.";
const PROPERTY_FOCUS: &str = "Property Details. Use the 'propertyNotes' field to summarize any important information that does not fit into the other predefined structured fields.";
const GENERAL_LIABILITY_FOCUS: &str = "General Liability Details. Use the 'generalLiabilityNotes' field for relevant information not captured elsewhere.";
const PRODUCT_LIABILITY_FOCUS: &str = "Product Liability Details. Use the 'productLiabilityNotes' field for relevant information not captured elsewhere.";
const SUBLIMITS_FOCUS: &str = "Sublimits.";
const BUILDINGS_FOCUS: &str = "Building Details (Dettaglio Edifici). Use the 'buildingNotes' field for relevant details.";

// ---------------------------------------------------------------------
// Sobres por sección: cada petición devuelve su sección bajo su clave
// ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct RiskSummaryEnvelope {
    risk_summary: Option<RiskSummary>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct AnagraficaEnvelope {
    anagrafica: Option<Anagrafica>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct PropertyEnvelope {
    property_details: Option<PropertyDetails>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct GeneralLiabilityEnvelope {
    general_liability_details: Option<GeneralLiabilityDetails>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct ProductLiabilityEnvelope {
    product_liability_details: Option<ProductLiabilityDetails>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
struct SublimitsEnvelope {
    #[serde(deserialize_with = "crate::models::array_or_empty")]
    sublimits: Vec<Sublimit>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
struct BuildingsEnvelope {
    #[serde(rename = "dettaglioEdifici", deserialize_with = "crate::models::array_or_empty")]
    dettaglio_edifici: Vec<BuildingDetail>,
}

fn section_instruction(focus: &str) -> String {
    format!("{BASE_INSTRUCTION} {focus}")
}

fn section_schema<E: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(E)).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------
// Ejecución
// ---------------------------------------------------------------------

/// Lanza las siete peticiones de sección en paralelo y ensambla el registro.
pub async fn extract_record(client: &GeminiClient, files: &[EncodedFile]) -> ExtractedRecord {
    let (summary, anagrafica, property, general, product, sublimits, buildings) = futures::join!(
        extract_section(
            client,
            files,
            "riskSummary",
            section_instruction(RISK_SUMMARY_FOCUS),
            section_schema::<RiskSummaryEnvelope>(),
            |e: RiskSummaryEnvelope| e.risk_summary,
        ),
        extract_section(
            client,
            files,
            "anagrafica",
            section_instruction(ANAGRAFICA_FOCUS),
            section_schema::<AnagraficaEnvelope>(),
            |e: AnagraficaEnvelope| e.anagrafica,
        ),
        extract_section(
            client,
            files,
            "propertyDetails",
            section_instruction(PROPERTY_FOCUS),
            section_schema::<PropertyEnvelope>(),
            |e: PropertyEnvelope| e.property_details,
        ),
        extract_section(
            client,
            files,
            "generalLiabilityDetails",
            section_instruction(GENERAL_LIABILITY_FOCUS),
            section_schema::<GeneralLiabilityEnvelope>(),
            |e: GeneralLiabilityEnvelope| e.general_liability_details,
        ),
        extract_section(
            client,
            files,
            "productLiabilityDetails",
            section_instruction(PRODUCT_LIABILITY_FOCUS),
            section_schema::<ProductLiabilityEnvelope>(),
            |e: ProductLiabilityEnvelope| e.product_liability_details,
        ),
        extract_section(
            client,
            files,
            "sublimits",
            section_instruction(SUBLIMITS_FOCUS),
            section_schema::<SublimitsEnvelope>(),
            |e: SublimitsEnvelope| Some(e.sublimits),
        ),
        extract_section(
            client,
            files,
            "dettaglioEdifici",
            section_instruction(BUILDINGS_FOCUS),
            section_schema::<BuildingsEnvelope>(),
            |e: BuildingsEnvelope| Some(e.dettaglio_edifici),
        ),
    );

    assemble_record(summary, anagrafica, property, general, product, sublimits, buildings)
}

/// Una petición de sección: el resultado llega o la sección queda ausente.
async fn extract_section<E, T, F>(
    client: &GeminiClient,
    files: &[EncodedFile],
    label: &str,
    instruction: String,
    schema: Value,
    pick: F,
) -> Section<T>
where
    E: serde::de::DeserializeOwned,
    F: FnOnce(E) -> Option<T>,
{
    let outcome = client.generate_structured(&instruction, files, schema).await;
    parse_section(outcome, label, pick)
}

/// Frontera de fallo por sección: cualquier error (transporte, JSON
/// malformado, esquema violado) se registra y se degrada a `Absent`.
fn parse_section<E, T, F>(
    outcome: Result<Value, GeminiError>,
    label: &str,
    pick: F,
) -> Section<T>
where
    E: serde::de::DeserializeOwned,
    F: FnOnce(E) -> Option<T>,
{
    match outcome {
        Ok(value) => match serde_json::from_value::<E>(value) {
            Ok(envelope) => Section::from(pick(envelope)),
            Err(err) => {
                warn!("La sección '{label}' devolvió JSON que no casa con su esquema: {err}. Se usa su valor vacío.");
                Section::Absent
            }
        },
        Err(err) => {
            warn!("La sección '{label}' falló: {err}. Se usa su valor vacío.");
            Section::Absent
        }
    }
}

/// Fusión final: cada sección ausente se materializa a su vacío; las
/// secciones-lista son arrays siempre, nunca null.
#[allow(clippy::too_many_arguments)]
fn assemble_record(
    risk_summary: Section<RiskSummary>,
    anagrafica: Section<Anagrafica>,
    property_details: Section<PropertyDetails>,
    general_liability_details: Section<GeneralLiabilityDetails>,
    product_liability_details: Section<ProductLiabilityDetails>,
    sublimits: Section<Vec<Sublimit>>,
    building_details: Section<Vec<BuildingDetail>>,
) -> ExtractedRecord {
    ExtractedRecord {
        risk_summary: risk_summary.materialize(),
        anagrafica: anagrafica.materialize(),
        property_details: property_details.materialize(),
        general_liability_details: general_liability_details.materialize(),
        product_liability_details: product_liability_details.materialize(),
        sublimits: sublimits.materialize(),
        building_details: building_details.materialize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn todas_las_secciones_ausentes_dan_un_registro_vacio_valido() {
        let record = assemble_record(
            Section::Absent,
            Section::Absent,
            Section::Absent,
            Section::Absent,
            Section::Absent,
            Section::Absent,
            Section::Absent,
        );
        assert_eq!(record, ExtractedRecord::default());
        // Propiedad clave: las listas son arrays, nunca null/ausentes.
        assert!(record.sublimits.is_empty());
        assert!(record.building_details.is_empty());
    }

    #[test]
    fn una_seccion_fallida_no_arrastra_a_las_demas() {
        let anagrafica = Anagrafica {
            entity_name: Some("Acme Corp".to_string()),
            ..Anagrafica::default()
        };
        let sublimits = vec![Sublimit {
            risk_type: Some("Property".to_string()),
            coverage: Some("Flood".to_string()),
            sublimit_type: Some("amount".to_string()),
            amount_eur_percent: Some("1.000.000".to_string()),
        }];

        let record = assemble_record(
            Section::Present(RiskSummary {
                risk_summary: Some("Resumen".to_string()),
            }),
            Section::Present(anagrafica),
            Section::Absent, // la única sección que falló
            Section::Present(GeneralLiabilityDetails::default()),
            Section::Present(ProductLiabilityDetails::default()),
            Section::Present(sublimits),
            Section::Present(Vec::new()),
        );

        assert_eq!(record.entity_name(), Some("Acme Corp"));
        assert_eq!(record.risk_summary.risk_summary.as_deref(), Some("Resumen"));
        assert_eq!(record.sublimits.len(), 1);
        // Sólo la sección fallida queda en su vacío.
        assert_eq!(record.property_details, PropertyDetails::default());
    }

    #[test]
    fn parse_section_degrada_errores_de_transporte() {
        let outcome: Result<Value, GeminiError> = Err(GeminiError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        let section =
            parse_section::<AnagraficaEnvelope, _, _>(outcome, "anagrafica", |e| e.anagrafica);
        assert!(section.is_absent());
    }

    #[test]
    fn parse_section_degrada_json_que_no_casa() {
        let outcome = Ok(json!({ "anagrafica": { "headcount": "muchos" } }));
        let section =
            parse_section::<AnagraficaEnvelope, _, _>(outcome, "anagrafica", |e| e.anagrafica);
        assert!(section.is_absent());
    }

    #[test]
    fn parse_section_acepta_la_seccion_presente() {
        let outcome = Ok(json!({ "anagrafica": { "entityName": "Acme Corp", "headcount": 120 } }));
        let section =
            parse_section::<AnagraficaEnvelope, _, _>(outcome, "anagrafica", |e| e.anagrafica);
        match section {
            Section::Present(anagrafica) => {
                assert_eq!(anagrafica.entity_name.as_deref(), Some("Acme Corp"));
                assert_eq!(anagrafica.headcount, Some(120));
            }
            Section::Absent => panic!("la sección debería estar presente"),
        }
    }

    #[test]
    fn parse_section_sin_clave_es_ausente() {
        let outcome = Ok(json!({}));
        let section =
            parse_section::<AnagraficaEnvelope, _, _>(outcome, "anagrafica", |e| e.anagrafica);
        assert!(section.is_absent());
    }

    #[test]
    fn seccion_de_lista_no_array_se_normaliza_a_vacia() {
        let outcome = Ok(json!({ "sublimits": "no aplica" }));
        let section =
            parse_section::<SublimitsEnvelope, _, _>(outcome, "sublimits", |e| Some(e.sublimits));
        match section {
            Section::Present(sublimits) => assert!(sublimits.is_empty()),
            Section::Absent => panic!("la normalización defensiva no debe fallar la sección"),
        }
    }

    #[test]
    fn los_esquemas_de_sobre_declaran_su_clave() {
        let schema = section_schema::<AnagraficaEnvelope>();
        let props = schema.get("properties").expect("propiedades del sobre");
        assert!(props.get("anagrafica").is_some());

        let schema = section_schema::<BuildingsEnvelope>();
        let props = schema.get("properties").expect("propiedades del sobre");
        assert!(props.get("dettaglioEdifici").is_some());
    }

    #[test]
    fn la_instruccion_de_anagrafica_excluye_al_asegurador() {
        let instruction = section_instruction(ANAGRAFICA_FOCUS);
        assert!(instruction.contains("Do NOT populate it with details about the insurer"));
        assert!(instruction.starts_with(BASE_INSTRUCTION));
    }
}
