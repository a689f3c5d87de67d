//! Formateadores de salida sobre el registro editado: CSV plano y borrador
//! de correo para reclamar datos faltantes. Sin lógica de extracción.

use serde::Serialize;
use serde_json::Value;

use crate::fields::{
    self, ANAGRAFICA_FIELDS, BUILDING_FIELDS, GENERAL_LIABILITY_FIELDS, PRODUCT_LIABILITY_FIELDS,
    PROPERTY_FIELDS, SUBLIMIT_FIELDS,
};
use crate::models::ExtractedRecord;

// ---------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------

/// Escapa una celda CSV: comillas dobladas y celda entrecomillada sólo
/// cuando contiene coma, comilla o salto de línea.
pub fn escape_csv_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Exporta el registro completo como un único CSV: secciones separadas por
/// líneas en blanco; tablas etiqueta/valor para las secciones fijas y
/// cabecera+filas para sublímites y edificios.
pub fn record_to_csv(record: &ExtractedRecord) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let cell = |value: &Value| escape_csv_cell(&fields::display_value(value));

    rows.push(vec!["Risk Summary".to_string()]);
    rows.push(vec![escape_csv_cell(
        record.risk_summary.risk_summary.as_deref().unwrap_or(""),
    )]);
    rows.push(Vec::new());

    let label_value_sections: [(&str, FieldTableRef, Value, Option<&str>); 4] = [
        (
            "General Information (Anagrafica)",
            ANAGRAFICA_FIELDS,
            to_value(&record.anagrafica),
            None,
        ),
        (
            "Property Details",
            PROPERTY_FIELDS,
            to_value(&record.property_details),
            Some("Property Notes"),
        ),
        (
            "General Liability Details",
            GENERAL_LIABILITY_FIELDS,
            to_value(&record.general_liability_details),
            Some("General Liability Notes"),
        ),
        (
            "Product Liability Details",
            PRODUCT_LIABILITY_FIELDS,
            to_value(&record.product_liability_details),
            Some("Product Liability Notes"),
        ),
    ];

    for (title, table, section, notes_label) in label_value_sections {
        rows.push(vec![title.to_string()]);
        rows.push(vec!["Field".to_string(), "Value".to_string()]);
        for (key, label) in table {
            rows.push(vec![
                escape_csv_cell(label),
                cell(&fields::field_value(&section, key)),
            ]);
        }
        if let Some(label) = notes_label {
            let key = notes_key(label);
            rows.push(vec![
                escape_csv_cell(label),
                cell(&fields::field_value(&section, key)),
            ]);
        }
        rows.push(vec![
            "Data Status".to_string(),
            cell(&fields::field_value(&section, "dataStatus")),
        ]);
        rows.push(Vec::new());
    }

    if !record.sublimits.is_empty() {
        rows.push(vec!["Sublimits".to_string()]);
        rows.push(
            SUBLIMIT_FIELDS
                .iter()
                .map(|(_, label)| escape_csv_cell(label))
                .collect(),
        );
        for sublimit in &record.sublimits {
            let section = to_value(sublimit);
            rows.push(
                SUBLIMIT_FIELDS
                    .iter()
                    .map(|(key, _)| cell(&fields::field_value(&section, key)))
                    .collect(),
            );
        }
        rows.push(Vec::new());
    }

    if !record.building_details.is_empty() {
        rows.push(vec!["Building Details (Dettaglio Edifici)".to_string()]);
        let mut headers: Vec<String> = BUILDING_FIELDS
            .iter()
            .map(|(_, label)| escape_csv_cell(label))
            .collect();
        headers.push("Building Notes".to_string());
        rows.push(headers);
        for building in &record.building_details {
            let section = to_value(building);
            let mut row: Vec<String> = BUILDING_FIELDS
                .iter()
                .map(|(key, _)| cell(&fields::field_value(&section, key)))
                .collect();
            row.push(cell(&fields::field_value(&section, "buildingNotes")));
            rows.push(row);
        }
        rows.push(Vec::new());
    }

    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nombre de fichero sugerido para el CSV.
pub fn csv_filename(record: &ExtractedRecord) -> String {
    match record.entity_name() {
        Some(name) => format!("{}_Underwriting_Data.csv", underscored(name)),
        None => "underwriting_data.csv".to_string(),
    }
}

pub(crate) fn underscored(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

type FieldTableRef = &'static [(&'static str, &'static str)];

fn to_value<T: Serialize>(section: &T) -> Value {
    serde_json::to_value(section).unwrap_or(Value::Null)
}

fn notes_key(label: &str) -> &'static str {
    match label {
        "Property Notes" => "propertyNotes",
        "General Liability Notes" => "generalLiabilityNotes",
        _ => "productLiabilityNotes",
    }
}

// ---------------------------------------------------------------------
// Borrador de correo para datos faltantes
// ---------------------------------------------------------------------

/// Borrador listo para revisar en el frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Recorre las cuatro secciones fijas con el predicado de faltantes y
/// redacta la petición de información al broker, agrupada por sección.
pub fn draft_missing_data_email(record: &ExtractedRecord) -> EmailDraft {
    let sections: [(&str, FieldTableRef, Value); 4] = [
        ("General Information", ANAGRAFICA_FIELDS, to_value(&record.anagrafica)),
        ("Property Details", PROPERTY_FIELDS, to_value(&record.property_details)),
        (
            "General Liability Details",
            GENERAL_LIABILITY_FIELDS,
            to_value(&record.general_liability_details),
        ),
        (
            "Product Liability Details",
            PRODUCT_LIABILITY_FIELDS,
            to_value(&record.product_liability_details),
        ),
    ];

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (title, table, section) in sections {
        let missing: Vec<String> = table
            .iter()
            .filter(|(key, _)| fields::is_missing_value(&fields::field_value(&section, key)))
            .map(|(_, label)| format!("- {label}"))
            .collect();
        if !missing.is_empty() {
            grouped.push((title.to_string(), missing));
        }
    }

    let entity = record.entity_name();
    let subject = format!(
        "Request for Information: Policy for {}",
        entity.unwrap_or("N/A")
    );
    let client_name = entity.unwrap_or("your client");

    let body = if grouped.is_empty() {
        format!(
            "Dear Broker,\n\nThank you for sending over the documentation for {client_name}. \
             All primary data fields appear to be complete based on our initial review.\n\n\
             If you have any additional information to provide, please let us know.\n\n\
             Best regards,\nYour Underwriting Team"
        )
    } else {
        let listing = grouped
            .iter()
            .map(|(title, missing)| format!("{title}:\n{}", missing.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "Dear Broker,\n\nThank you for sending over the documentation. To proceed with the \
             underwriting process for {client_name}, we kindly request the following missing or \
             zero-value information:\n\n{listing}\n\nPlease provide these details at your \
             earliest convenience.\n\nBest regards,\nYour Underwriting Team"
        )
    };

    EmailDraft { subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Registro con las cuatro secciones fijas completamente pobladas.
    fn full_record() -> ExtractedRecord {
        serde_json::from_value(json!({
            "riskSummary": { "riskSummary": "Riesgo industrial con límites altos" },
            "anagrafica": {
                "entityName": "Acme Corp", "altNames": "Acme SpA", "type": "Insured",
                "industry": "Manufacturing", "country": "Italy", "city": "Milano",
                "address": "Via Roma 1", "topLocation": "Milano", "vat": "IT123",
                "taxCode": "ACM123", "website": "https://acme.example",
                "brokerName": "Mario Rossi", "brokerCompany": "Broker SpA",
                "periodFrom": "2026-01-01", "periodTo": "2026-12-31",
                "riskTypes": "Property, Liability", "territorialScope": "EU",
                "lossHistory5y": "None reported", "annualRevenueAmount": 5000000.0,
                "annualRevenueYear": 2025, "payrollAmount": 800000.0,
                "payrollYear": 2025, "headcount": 120, "dataStatus": "ok"
            },
            "propertyDetails": {
                "tivPdTotalEur": 10000000.0, "tivBiSumInsEur": 2000000.0,
                "ratePerMille": 1.2, "catIncluded": "Yes", "buildingsEur": 6000000.0,
                "machineryEur": 3000000.0, "stockEur": 500000.0,
                "marginContributionEur": 400000.0,
                "fireProtectionSummary": "Sprinklers everywhere",
                "natHazardNotes": "Flood zone B", "biPeriodMonths": 12,
                "biNotes": "Standard", "propertyNotes": "Sin novedades",
                "dataStatus": "ok"
            },
            "generalLiabilityDetails": {
                "rctLimitEur": 5000000.0, "aggregateLimitEur": 10000000.0,
                "formRctRco": "Loss Occurrence", "usaCanCovered": "No",
                "dedRct": 5000.0, "extensions": "Cross liability",
                "exclusions": "Asbestos", "waivers": "None",
                "retroUltrattivita": "N/A",
                "generalLiabilityNotes": "OK", "dataStatus": "ok"
            },
            "productLiabilityDetails": {
                "rcpLimitEur": 3000000.0, "formRcp": "Claims Made",
                "recallSublimitEur": 250000.0, "pollutionAccSublimitEur": 100000.0,
                "interruptionThirdPartySublimitEur": 150000.0, "dedRcp": 10000.0,
                "productLiabilityNotes": "OK", "dataStatus": "ok"
            },
            "sublimits": [{
                "riskType": "Property", "coverage": "Flood",
                "sublimitType": "amount", "amountEurPercent": "1.000.000"
            }],
            "dettaglioEdifici": [{
                "buildingId": "B1", "buildingName": "Planta principal",
                "address": "Via Roma 1", "occupancy": "production",
                "floorAreaSm": 12000.0, "buildingRcvEur": 4000000.0,
                "contentsRcvEur": 1500000.0, "totalRcvEur": 5500000.0,
                "yearBuilt": 1998, "manualFireAlarmPercent": 100.0,
                "automaticFireAlarmPercent": 80.0, "sprinklersPercent": 60.0,
                "roofMaterial": "Concrete", "buildingNotes": "Nave con ampliación, ala \"B\""
            }]
        }))
        .unwrap()
    }

    #[test]
    fn escapado_de_celdas_segun_contenido() {
        assert_eq!(escape_csv_cell("simple"), "simple");
        assert_eq!(escape_csv_cell("a,\"b\"\nc"), "\"a,\"\"b\"\"\nc\"");
        assert_eq!(escape_csv_cell("con,coma"), "\"con,coma\"");
        assert_eq!(escape_csv_cell("di\"go"), "\"di\"\"go\"");
        assert_eq!(escape_csv_cell(""), "");
    }

    #[test]
    fn round_trip_de_celda_escapada() {
        // Un parser CSV conforme recupera el original: quitar comillas
        // exteriores y desdoblar las interiores.
        let original = "a,\"b\"\nc";
        let escaped = escape_csv_cell(original);
        let inner = escaped.strip_prefix('"').unwrap().strip_suffix('"').unwrap();
        assert_eq!(inner.replace("\"\"", "\""), original);
    }

    #[test]
    fn el_csv_separa_secciones_con_lineas_en_blanco() {
        let csv = record_to_csv(&full_record());
        assert!(csv.starts_with("Risk Summary\n"));
        assert!(csv.contains("\n\nGeneral Information (Anagrafica)\nField,Value\n"));
        assert!(csv.contains("\n\nSublimits\n"));
        assert!(csv.contains("\n\nBuilding Details (Dettaglio Edifici)\n"));
        assert!(csv.contains("Entity Name,Acme Corp"));
        assert!(csv.contains("Data Status,ok"));
        // Importe sin decimales se aplana a entero.
        assert!(csv.contains("TIV PD Total (EUR),10000000"));
    }

    #[test]
    fn el_csv_omite_tablas_vacias() {
        let csv = record_to_csv(&ExtractedRecord::default());
        assert!(!csv.contains("Sublimits"));
        assert!(!csv.contains("Building Details"));
        // Las secciones fijas siempre están, aunque vacías.
        assert!(csv.contains("General Information (Anagrafica)"));
    }

    #[test]
    fn celdas_con_comillas_sobreviven_en_el_csv() {
        let csv = record_to_csv(&full_record());
        assert!(csv.contains("\"Nave con ampliación, ala \"\"B\"\"\""));
    }

    #[test]
    fn nombre_de_fichero_con_entidad() {
        assert_eq!(csv_filename(&full_record()), "Acme_Corp_Underwriting_Data.csv");
        assert_eq!(csv_filename(&ExtractedRecord::default()), "underwriting_data.csv");
    }

    #[test]
    fn registro_completo_produce_el_correo_sin_faltantes() {
        let draft = draft_missing_data_email(&full_record());
        assert_eq!(draft.subject, "Request for Information: Policy for Acme Corp");
        assert!(draft.body.contains("appear to be complete"));
        assert!(!draft.body.contains("- "));
    }

    #[test]
    fn los_faltantes_se_agrupan_por_seccion() {
        let mut record = full_record();
        record.anagrafica.vat = None;
        record.property_details.stock_eur = Some(0.0); // el cero cuenta como faltante
        record.general_liability_details.waivers = Some(String::new());

        let draft = draft_missing_data_email(&record);
        assert!(draft.body.contains("missing or zero-value information"));
        assert!(draft.body.contains("General Information:\n- VAT Number"));
        assert!(draft.body.contains("Property Details:\n- Stock (EUR)"));
        assert!(draft.body.contains("General Liability Details:\n- Waivers"));
        assert!(!draft.body.contains("Product Liability Details:"));
    }

    #[test]
    fn registro_vacio_lista_todo_y_usa_placeholder() {
        let draft = draft_missing_data_email(&ExtractedRecord::default());
        assert_eq!(draft.subject, "Request for Information: Policy for N/A");
        assert!(draft.body.contains("your client"));
        assert!(draft.body.contains("- Entity Name"));
        assert!(draft.body.contains("- Deductible RCP"));
    }
}
